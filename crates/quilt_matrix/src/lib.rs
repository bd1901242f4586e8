pub mod bin;
pub mod chunked_matrix_client;
pub mod coordinate;
pub mod dispatcher;
pub mod error;
pub mod matrix;
pub mod oracle;
pub mod stitcher;
pub mod travel_matrices;

#[cfg(test)]
pub(crate) mod test_utils;
