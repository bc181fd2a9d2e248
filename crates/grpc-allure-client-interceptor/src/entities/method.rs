use std::fmt;

use tonic::codegen::http::uri::PathAndQuery;
use tonic::Status;

/// Shape of a gRPC method as seen by the interceptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Unary,
    ServerStreaming,
}

impl fmt::Display for MethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodKind::Unary => f.write_str("UNARY"),
            MethodKind::ServerStreaming => f.write_str("SERVER_STREAMING"),
        }
    }
}

/// Represents a gRPC method within a fully qualified service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrpcMethod {
    pub service: String,
    pub name: String,
    pub kind: MethodKind,
}

impl GrpcMethod {
    pub fn new(service: impl Into<String>, name: impl Into<String>, kind: MethodKind) -> Self {
        Self {
            service: service.into(),
            name: name.into(),
            kind,
        }
    }

    pub fn unary(service: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(service, name, MethodKind::Unary)
    }

    pub fn server_streaming(service: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(service, name, MethodKind::ServerStreaming)
    }

    /// Fully qualified method name, `package.Service/Method`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.service, self.name)
    }

    /// HTTP/2 path the call is routed to
    pub fn path(&self) -> Result<PathAndQuery, Status> {
        let path = format!("/{}", self.full_name());
        PathAndQuery::try_from(path)
            .map_err(|e| Status::internal(format!("Invalid gRPC path for {}: {}", self, e)))
    }

    /// Text attached to the report step as the method descriptor
    pub fn describe(&self) -> String {
        format!(
            "full_method_name: \"{}\"\ntype: {}\n",
            self.full_name(),
            self.kind
        )
    }
}

impl fmt::Display for GrpcMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.service, self.name)
    }
}
