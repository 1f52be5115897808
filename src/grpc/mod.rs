/*!
   Generic gRPC queries against chain nodes.

   Request messages are dispatched by their proto name through a
   [`QueryPathRegistry`], which is filled from each chain's reflection
   service during suite set up.
*/

pub mod queries;
pub mod query;
pub mod registry;

pub use queries::{register_known_queries, GrpcClient, CLIENT_STATUS_ACTIVE, CLIENT_STATUS_EXPIRED};
pub use query::{grpc_query, grpc_query_with_method};
pub use registry::{conventional_query_path, QueryPathRegistry};
