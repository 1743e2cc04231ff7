pub mod compression_service;
pub mod image_service;
pub mod upload_service;
