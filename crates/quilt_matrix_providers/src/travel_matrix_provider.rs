use quilt_matrix::travel_matrices::TravelMatrices;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::graphhopper_api::GraphHopperProfile;

fn default_osrm_profile() -> String {
    String::from("driving")
}

#[derive(Deserialize, Serialize, JsonSchema, Debug, Clone)]
pub enum TravelMatrixProvider {
    /// OSRM `table` service. Without `url`, the `OSRM_URL` environment variable is used.
    Osrm {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        #[serde(default = "default_osrm_profile")]
        profile: String,
    },
    /// https://docs.graphhopper.com/openapi/map-data-and-routing-profiles/openstreetmap/standard-routing-profiles
    GraphHopperApi {
        gh_profile: GraphHopperProfile,
    },
    AsTheCrowFlies {
        speed_kmh: f64,
    },

    Custom {
        matrices: TravelMatrices,
    },
}

impl std::hash::Hash for TravelMatrixProvider {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            TravelMatrixProvider::Osrm { url, profile } => {
                state.write_u8(3);
                url.hash(state);
                profile.hash(state);
            }
            TravelMatrixProvider::GraphHopperApi { gh_profile } => {
                state.write_u8(0);
                gh_profile.hash(state);
            }
            TravelMatrixProvider::AsTheCrowFlies { speed_kmh } => {
                state.write_u8(1);
                state.write_u64(speed_kmh.to_bits());
            }
            TravelMatrixProvider::Custom { matrices } => {
                state.write_u8(2);
                matrices.hash(state);
            }
        }
    }
}

impl std::fmt::Display for TravelMatrixProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TravelMatrixProvider::Osrm { profile, .. } => write!(f, "osrm ({profile})"),
            TravelMatrixProvider::GraphHopperApi { gh_profile } => {
                write!(f, "graphhopper ({gh_profile})")
            }
            TravelMatrixProvider::AsTheCrowFlies { speed_kmh } => {
                write!(f, "as the crow flies ({speed_kmh} km/h)")
            }
            TravelMatrixProvider::Custom { matrices } => {
                write!(f, "custom ({} locations)", matrices.num_locations)
            }
        }
    }
}
