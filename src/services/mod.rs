pub mod access_control_service;
pub mod check_in_service;
pub mod event_catalog_service;
pub mod reporting_service;
pub mod visibility_service;
