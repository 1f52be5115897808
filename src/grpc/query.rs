use super::QueryPathRegistry;
use crate::error::QueryError;
use prost::{Message, Name};
use std::str::FromStr;
use tonic::{
    client::Grpc,
    codec::ProstCodec,
    codegen::http::uri::PathAndQuery,
    transport::Endpoint,
    Request,
};
use tracing::trace;

/**
   Sends `request` to the chain at `endpoint` and decodes the response.

   The method is looked up in `registry` by the request's proto name before
   any connection is made, so an unregistered request type fails fast with
   [`QueryError::UnknownRequest`].
*/
pub async fn grpc_query<Req, Resp>(
    endpoint: &str,
    registry: &QueryPathRegistry,
    request: Req,
) -> Result<Resp, QueryError>
where
    Req: Message + Name + Send + Sync + 'static,
    Resp: Message + Default + Send + Sync + 'static,
{
    let path = registry.resolve_for::<Req>()?.to_owned();

    grpc_query_with_method(endpoint, &path, request).await
}

/// Sends `request` to the method at `path`, e.g. `/ibc.core.client.v1.Query/ClientState`.
pub async fn grpc_query_with_method<Req, Resp>(
    endpoint: &str,
    path: &str,
    request: Req,
) -> Result<Resp, QueryError>
where
    Req: Message + Send + Sync + 'static,
    Resp: Message + Default + Send + Sync + 'static,
{
    let method = PathAndQuery::from_str(path).map_err(|_| QueryError::InvalidPath(path.to_owned()))?;

    trace!("querying {path} at {endpoint}");

    let channel = Endpoint::from_shared(endpoint.to_owned())?.connect().await?;
    let mut grpc = Grpc::new(channel);
    grpc.ready().await?;

    let codec: ProstCodec<Req, Resp> = ProstCodec::default();
    let response = grpc.unary(Request::new(request), method, codec).await?;

    Ok(response.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ibc_proto::ibc::core::client::v1::{QueryClientStateRequest, QueryClientStateResponse};

    #[tokio::test]
    async fn test_unregistered_request_fails_before_dialing() {
        let registry = QueryPathRegistry::new();

        // Nothing listens here; the lookup must fail first.
        let res: Result<QueryClientStateResponse, _> = grpc_query(
            "http://127.0.0.1:1",
            &registry,
            QueryClientStateRequest {
                client_id: "07-tendermint-0".to_owned(),
            },
        )
        .await;

        assert!(matches!(res, Err(QueryError::UnknownRequest(_))));
    }

    #[tokio::test]
    async fn test_invalid_method_path() {
        let res: Result<QueryClientStateResponse, _> = grpc_query_with_method(
            "http://127.0.0.1:1",
            "not a path",
            QueryClientStateRequest::default(),
        )
        .await;

        assert!(matches!(res, Err(QueryError::InvalidPath(_))));
    }

    #[tokio::test]
    async fn test_connection_errors_propagate() {
        let mut registry = QueryPathRegistry::new();
        registry.register_by_convention::<QueryClientStateRequest>().unwrap();

        let res: Result<QueryClientStateResponse, _> = grpc_query(
            "http://127.0.0.1:1",
            &registry,
            QueryClientStateRequest::default(),
        )
        .await;

        assert!(matches!(res, Err(QueryError::Transport(_))));
    }
}
