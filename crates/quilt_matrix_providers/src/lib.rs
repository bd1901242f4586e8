pub mod as_the_crow_flies;
pub mod cache;
pub mod custom_matrices;
pub mod graphhopper_api;
pub mod travel_matrix_client;
pub mod travel_matrix_provider;
