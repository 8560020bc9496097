use actix_web::{
    HttpRequest, HttpResponse, get,
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    web::{self, Path},
};
use tracing::{Instrument, instrument};

use crate::{
    api::{
        rest::{ReportQuery, ReportResponse, to_report_input},
        state::AppState,
    },
    model::{apperror::ApplicationError, models::AccidentReport},
    service::composer::export_csv,
};

/**
 * Endpoint to compute the pedestrian and cyclist report of a municipality.
 */
#[instrument(level = "info", skip(http_request, app_state), fields(service = "getReport", trace_id = get_trace_id(&http_request), result))]
#[get("/api/services/v1_0/reports/{year}/{code}")]
pub async fn report_get(path: Path<(String, String)>, query: web::Query<ReportQuery>, http_request: HttpRequest, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    let (year, code) = path.into_inner();
    let report = get_report(&year, code, &query, &app_state).instrument(span).await?;
    Ok(HttpResponse::Ok().json(ReportResponse::from(report)))
}

/**
 * Endpoint to download the victim table of a report as CSV. Answers 204 when there is nothing to export.
 */
#[instrument(level = "info", skip(http_request, app_state), fields(service = "exportReport", trace_id = get_trace_id(&http_request), result))]
#[get("/api/services/v1_0/reports/{year}/{code}/export")]
pub async fn report_export(path: Path<(String, String)>, query: web::Query<ReportQuery>, http_request: HttpRequest, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    let (year, code) = path.into_inner();
    let report = get_report(&year, code, &query, &app_state).instrument(span).await?;
    let Some(export) = report.export else {
        return Ok(HttpResponse::NoContent().finish());
    };
    let body = export_csv(&export)?;
    let file_name = format!("accidents_{}_{}.csv", report.statistics.codes.first().map_or("", String::as_str), report.year);
    Ok(HttpResponse::Ok()
        .insert_header((CONTENT_TYPE, "text/csv; charset=utf-8"))
        .insert_header((CONTENT_DISPOSITION, format!("attachment; filename=\"{file_name}\"")))
        .body(body))
}

/**
 * Validates the request and computes the report, counting successes and failures.
 */
async fn get_report(year: &str, code: String, query: &ReportQuery, app_state: &AppState) -> Result<AccidentReport, ApplicationError> {
    let result = match to_report_input(year, code, query).and_then(|input| input.validate()) {
        Ok(report_input) => app_state.report_service.get_report(report_input).await,
        Err(err) => Err(err),
    };
    match &result {
        Ok(_) => app_state.reports_generated.inc(),
        Err(err) => {
            tracing::debug!("Report request failed: {}", err);
            app_state.report_failures.inc();
        }
    }
    result
}

/**
 * Retrieves the trace ID from the HTTP request headers.
 * If the trace ID is not present, a new UUID is generated.
 */
fn get_trace_id(http_request: &HttpRequest) -> String {
    http_request.headers().get("X-Trace-ID")
        .and_then(|v| v.to_str().ok().map(std::string::ToString::to_string))
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

#[cfg(test)]
mod test {
    use actix_web::{App, http::StatusCode, test::{self, TestRequest}};
    use prometheus::IntCounter;
    use sqlx::{ConnectOptions, Connection, sqlite::SqliteConnectOptions};
    use tempfile::TempDir;

    use super::*;
    use crate::{
        dao::{
            accidents::AccidentsDao,
            commune::ConfiguredResolver,
            fixture::{FIXTURE_YEAR, seed},
            store::AccidentStore,
        },
        service::{consolidator::Consolidator, report::ReportService},
    };

    async fn app_state() -> (TempDir, web::Data<AppState>) {
        let directory = tempfile::tempdir().unwrap();
        let store = AccidentStore::new(directory.path().to_path_buf(), "accidents_".to_string());
        let mut connection = SqliteConnectOptions::new().filename(store.path(FIXTURE_YEAR)).create_if_missing(true).connect().await.unwrap();
        seed(&mut connection).await;
        connection.close().await.unwrap();
        let report_service = ReportService::new(store, Consolidator::new(AccidentsDao::new()), ConfiguredResolver::Disabled);
        let state = AppState::new(report_service, IntCounter::new("reports_generated", "Reports").unwrap(), IntCounter::new("report_failures", "Failures").unwrap());
        (directory, web::Data::new(state))
    }

    #[actix_web::test]
    async fn test_get_trace_id_exists() {
        let request = TestRequest::default()
            .insert_header(("X-Trace-ID", "test"))
            .to_http_request();
        let trace_id = get_trace_id(&request);
        assert_eq!(trace_id, "test");
    }

    #[actix_web::test]
    async fn test_get_trace_id_not_exists() {
        let request = TestRequest::default()
            .to_http_request();
        let trace_id = get_trace_id(&request);
        assert!(!trace_id.is_empty());
    }

    #[actix_web::test]
    async fn test_report_get() {
        let (_directory, state) = app_state().await;
        let app = test::init_service(App::new().app_data(state.clone()).service(report_get)).await;
        let request = TestRequest::get().uri("/api/services/v1_0/reports/2023/93051").to_request();
        let response: serde_json::Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(response["communeName"], "Unknown commune");
        assert_eq!(response["pedestrians"]["total"], 2);
        assert_eq!(response["cyclists"]["children"], 1);
        assert_eq!(response["victims"].as_array().unwrap().len(), 4);
        assert_eq!(response["exportAvailable"], true);
        assert_eq!(state.reports_generated.get(), 1);
    }

    #[actix_web::test]
    async fn test_report_get_invalid_code() {
        let (_directory, state) = app_state().await;
        let app = test::init_service(App::new().app_data(state.clone()).service(report_get)).await;
        let request = TestRequest::get().uri("/api/services/v1_0/reports/2023/930").to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(state.report_failures.get(), 1);
    }

    #[actix_web::test]
    async fn test_report_get_missing_year() {
        let (_directory, state) = app_state().await;
        let app = test::init_service(App::new().app_data(state).service(report_get)).await;
        let request = TestRequest::get().uri("/api/services/v1_0/reports/2020/93051").to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_report_export() {
        let (_directory, state) = app_state().await;
        let app = test::init_service(App::new().app_data(state).service(report_export)).await;
        let request = TestRequest::get().uri("/api/services/v1_0/reports/2023/93056/export").to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get(CONTENT_DISPOSITION).unwrap(), "attachment; filename=\"accidents_93056_2023.csv\"");
        let body = String::from_utf8(test::read_body(response).await.to_vec()).unwrap();
        assert!(body.starts_with("Accident ID,Date,Victim type,Severity,Vehicles involved,Address,Latitude,Longitude"));
        assert_eq!(body.lines().count(), 3);
    }

    #[actix_web::test]
    async fn test_report_export_without_victims() {
        let (_directory, state) = app_state().await;
        let app = test::init_service(App::new().app_data(state).service(report_export)).await;
        let request = TestRequest::get().uri("/api/services/v1_0/reports/2023/99999/export").to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }
}
