pub mod aggregate;
pub mod config;
pub mod dag;
pub mod domain;
pub mod encoder;
pub mod error;
pub mod frame;
pub mod jobs;
pub mod matrix;
pub mod predictor;
pub mod processors;
pub mod repository;
pub mod source;
pub mod storage;
