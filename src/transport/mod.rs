pub mod headers;
pub mod http_transport;
pub mod shaper;

pub use headers::{build_headers, ExtraParameters};
pub use http_transport::HttpTransport;
pub use shaper::{
    check_routing_requirement, compose_url, shape, FilePart, InvocationRequest, JsonObject,
    KnownRoute, Payload, ShapedRequest, ShaperDefaults, WireBody,
};
