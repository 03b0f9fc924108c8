pub mod access_requests;
pub mod answers;
pub mod audit;
pub mod clients;
pub mod context;
pub mod documents;
pub mod health;
pub mod projects;
pub mod role_requests;
pub mod users;
