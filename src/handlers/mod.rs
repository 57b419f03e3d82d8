pub mod dispatch_handlers;
pub mod health_handlers;
