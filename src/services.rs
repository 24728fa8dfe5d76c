pub mod admin_service;
pub mod auth;
pub mod webhook_service;
