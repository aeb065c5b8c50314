mod http_transport;

pub use http_transport::{build_upstream_headers, HttpTransport, UpstreamByteStream};
