pub mod consts;
pub mod error;
pub mod models;
pub mod queue;
pub mod routes;
pub mod settings;
pub mod signing;
pub mod state;
pub mod util;
