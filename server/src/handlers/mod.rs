pub mod bulletin_handlers;
pub mod service_handler;
