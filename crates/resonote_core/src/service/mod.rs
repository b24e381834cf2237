pub mod library_service;
pub mod normalizer;
pub mod persistence;
pub mod pipeline;
pub mod reflection_service;
pub mod tag_service;
pub mod validator;
