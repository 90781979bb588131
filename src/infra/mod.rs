pub mod geocoder;
pub mod http_client;
