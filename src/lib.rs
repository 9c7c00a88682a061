pub mod config;
pub mod google;
pub mod importer;
pub mod model;
pub mod notion;
pub mod reading_list;
pub mod reconcile;
pub mod sync;
