pub mod archive;
mod client;
pub mod elpriset;
pub mod price_source;

pub use self::{
    archive::Api as Archive,
    elpriset::Api as Elpriset,
    price_source::{PriceSource, PriceZone},
};
