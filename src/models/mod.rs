pub mod access_request;
pub mod audit;
pub mod document;
pub mod role_request;
pub mod tenant;
pub mod user;
