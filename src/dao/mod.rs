pub mod accidents;
pub mod commune;
pub mod store;

#[cfg(test)]
pub mod fixture;
