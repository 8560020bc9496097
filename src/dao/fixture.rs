//! Seed data shared by the query and service tests. Column types mirror what the yearly import writes.

use sqlx::SqliteConnection;

pub const FIXTURE_YEAR: i32 = 2023;

const SCHEMA_AND_ROWS: &str = r"
CREATE TABLE caract (Num_Acc INTEGER, jour INTEGER, mois INTEGER, an INTEGER, hrmn TEXT, lum INTEGER, dep TEXT, com TEXT, agg INTEGER, adr TEXT, lat TEXT, long TEXT);
CREATE TABLE lieux (Num_Acc INTEGER, catr INTEGER, voie TEXT);
CREATE TABLE usagers (Num_Acc INTEGER, id_usager TEXT, id_vehicule TEXT, num_veh TEXT, place INTEGER, catu INTEGER, grav INTEGER, sexe INTEGER, an_nais REAL);
CREATE TABLE vehicules (Num_Acc INTEGER, id_vehicule TEXT, num_veh TEXT, catv INTEGER);

-- 93051: pedestrian hit by a car, one uninjured pedestrian and an uninjured driver
INSERT INTO caract (Num_Acc, jour, mois, an, hrmn, com, adr, lat, long) VALUES (202300000001, 2, 3, 2023, '08:00', '93051', 'RUE DE LA REPUBLIQUE', '48,8430', '2,5520');
INSERT INTO vehicules VALUES (202300000001, '100 001', 'A01', 7);
INSERT INTO usagers (Num_Acc, id_usager, num_veh, catu, grav, an_nais) VALUES (202300000001, '1 001', 'A01', 3, 3, 2010);
INSERT INTO usagers (Num_Acc, id_usager, num_veh, catu, grav, an_nais) VALUES (202300000001, '1 002', 'A01', 3, 1, 1985);
INSERT INTO usagers (Num_Acc, id_usager, num_veh, catu, grav, an_nais) VALUES (202300000001, '1 003', 'A01', 1, 1, 1970);

-- 93051: cyclist killed by a car and a truck, the car driver is slightly injured
INSERT INTO caract (Num_Acc, jour, mois, an, hrmn, com, adr, lat, long) VALUES (202300000002, 15, 1, 2023, '14:30', '93051', 'BOULEVARD DU MONT D''EST', '48,8370', '2,5600');
INSERT INTO vehicules VALUES (202300000002, '100 002', 'A01', 1);
INSERT INTO vehicules VALUES (202300000002, '100 003', 'B01', 7);
INSERT INTO vehicules VALUES (202300000002, '100 004', 'C01', 13);
INSERT INTO usagers (Num_Acc, id_usager, num_veh, catu, grav, an_nais) VALUES (202300000002, '1 004', 'A01', 1, 2, 1980);
INSERT INTO usagers (Num_Acc, id_usager, num_veh, catu, grav, an_nais) VALUES (202300000002, '1 005', 'B01', 1, 4, 1975);

-- 93051: child on an e-bike falls alone
INSERT INTO caract (Num_Acc, jour, mois, an, hrmn, com, adr, lat, long) VALUES (202300000003, 15, 1, 2023, '09:00', '93051', 'ALLEE DU BOIS', '48,8410', '2,5480');
INSERT INTO vehicules VALUES (202300000003, '100 005', 'A01', 80);
INSERT INTO usagers (Num_Acc, id_usager, num_veh, catu, grav, an_nais) VALUES (202300000003, '1 006', 'A01', 1, 4, 2008);

-- 93051: pedestrian killed by a motorbike, time stored without separator
INSERT INTO caract (Num_Acc, jour, mois, an, hrmn, com, adr, lat, long) VALUES (202300000004, 10, 6, 2023, '1715', '93051', NULL, '48,8450', '2,5510');
INSERT INTO vehicules VALUES (202300000004, '100 006', 'A01', 33);
INSERT INTO usagers (Num_Acc, id_usager, num_veh, catu, grav, an_nais) VALUES (202300000004, '1 007', 'A01', 3, 2, 1950);

-- 93052: pedestrian slightly injured by a car
INSERT INTO caract (Num_Acc, jour, mois, an, hrmn, com, adr, lat, long) VALUES (202300000005, 1, 2, 2023, '12:00', '93052', 'AVENUE JEAN JAURES', '48,8500', '2,5300');
INSERT INTO vehicules VALUES (202300000005, '100 007', 'A01', 7);
INSERT INTO usagers (Num_Acc, id_usager, num_veh, catu, grav, an_nais) VALUES (202300000005, '1 008', 'A01', 3, 4, 1990);

-- 93053: pedestrian without any vehicle record
INSERT INTO caract (Num_Acc, jour, mois, an, hrmn, com, adr, lat, long) VALUES (202300000006, 1, 4, 2023, '10:00', '93053', 'PLACE DU MARCHE', '48,8600', '2,5000');
INSERT INTO usagers (Num_Acc, id_usager, num_veh, catu, grav, an_nais) VALUES (202300000006, '1 009', NULL, 3, 3, 2000);

-- 93054: cyclist alone on a bicycle
INSERT INTO caract (Num_Acc, jour, mois, an, hrmn, com, adr, lat, long) VALUES (202300000007, 20, 5, 2023, '18:45', '93054', 'QUAI DE LA MARNE', '48,8700', '2,4900');
INSERT INTO vehicules VALUES (202300000007, '100 008', 'A01', 1);
INSERT INTO usagers (Num_Acc, id_usager, num_veh, catu, grav, an_nais) VALUES (202300000007, '1 010', 'A01', 1, 3, 1995);

-- 93056: two pedestrians hit by the same bus
INSERT INTO caract (Num_Acc, jour, mois, an, hrmn, com, adr, lat, long) VALUES (202300000008, 7, 9, 2023, '07:30', '93056', 'RUE DE PARIS', '48,8800', '2,4800');
INSERT INTO vehicules VALUES (202300000008, '100 009', 'A01', 37);
INSERT INTO usagers (Num_Acc, id_usager, num_veh, catu, grav, an_nais) VALUES (202300000008, '1 011', 'A01', 3, 3, 1960);
INSERT INTO usagers (Num_Acc, id_usager, num_veh, catu, grav, an_nais) VALUES (202300000008, '1 012', 'A01', 3, 4, 1962);
";

/**
 * Creates the four relations and inserts the fixture accidents.
 */
pub async fn seed(connection: &mut SqliteConnection) {
    sqlx::raw_sql(SCHEMA_AND_ROWS).execute(connection).await.unwrap();
}
