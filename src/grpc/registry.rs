use crate::error::QueryError;
use prost::{Message, Name};
use prost_types::FileDescriptorProto;
use std::collections::{HashMap, HashSet};
use tonic::transport::{Channel, Endpoint};
use tonic_reflection::pb::v1alpha::{
    server_reflection_client::ServerReflectionClient, server_reflection_request::MessageRequest,
    server_reflection_response::MessageResponse, ServerReflectionRequest,
};
use tracing::{debug, info};

/// Services exposed by every gRPC server that are never queried.
const IGNORED_SERVICE_PREFIX: &str = "grpc.reflection.";

/// Query methods whose request type does not follow the `QueryXRequest` convention.
const IRREGULAR_QUERY_PATHS: &[(&str, &str)] = &[
    (
        "cosmos.base.tendermint.v1beta1.GetValidatorSetByHeightRequest",
        "/cosmos.base.tendermint.v1beta1.Service/GetValidatorSetByHeight",
    ),
    (
        "cosmos.base.tendermint.v1beta1.GetLatestBlockRequest",
        "/cosmos.base.tendermint.v1beta1.Service/GetLatestBlock",
    ),
    (
        "cosmos.base.tendermint.v1beta1.GetNodeInfoRequest",
        "/cosmos.base.tendermint.v1beta1.Service/GetNodeInfo",
    ),
];

/**
   Maps the fully qualified name of a query request message to the gRPC
   method that accepts it, e.g. `ibc.core.client.v1.QueryClientStateRequest`
   to `/ibc.core.client.v1.Query/ClientState`.

   One registry is built per suite while chains start up and is shared
   read-only afterwards.
*/
#[derive(Debug, Clone, Default)]
pub struct QueryPathRegistry {
    paths: HashMap<String, String>,
}

impl QueryPathRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the irregular method paths of the Cosmos SDK services.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for (type_name, path) in IRREGULAR_QUERY_PATHS {
            registry.register(*type_name, *path);
        }

        registry
    }

    /// Maps `type_name` to `path`, replacing any previous entry.
    pub fn register(&mut self, type_name: impl Into<String>, path: impl Into<String>) {
        self.paths.insert(type_name.into(), path.into());
    }

    /// Registers `M` under the path derived by [`conventional_query_path`].
    pub fn register_by_convention<M: Name>(&mut self) -> Result<(), QueryError> {
        let type_name = M::full_name();
        let path = conventional_query_path(&type_name)?;
        self.register(type_name, path);

        Ok(())
    }

    /// The method path for `type_name`.
    pub fn resolve(&self, type_name: &str) -> Result<&str, QueryError> {
        self.paths
            .get(type_name)
            .map(String::as_str)
            .ok_or_else(|| QueryError::UnknownRequest(type_name.to_owned()))
    }

    /// The method path for the request message `M`.
    pub fn resolve_for<M: Name>(&self) -> Result<&str, QueryError> {
        self.resolve(&M::full_name())
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /**
       Registers the input type of every method of `service` declared in
       `file`. Every service in the file is registered when `service` is
       `None`. Existing entries are kept. Returns the number of new entries.
    */
    pub fn register_file_descriptor(&mut self, file: &FileDescriptorProto, service: Option<&str>) -> usize {
        let package = file.package();
        let mut added = 0;

        for svc in &file.service {
            let full_name = if package.is_empty() {
                svc.name().to_owned()
            } else {
                format!("{package}.{}", svc.name())
            };

            if service.is_some_and(|wanted| wanted != full_name) {
                continue;
            }

            for method in &svc.method {
                let input_type = method.input_type().trim_start_matches('.').to_owned();
                let path = format!("/{full_name}/{}", method.name());

                if !self.paths.contains_key(&input_type) {
                    self.paths.insert(input_type, path);
                    added += 1;
                }
            }
        }

        added
    }

    /**
       Populates the registry from the gRPC reflection service at `endpoint`.

       Lists the services, fetches the file descriptor declaring each and
       registers their methods. Returns the number of new entries.
    */
    pub async fn populate_from_reflection(&mut self, endpoint: &str) -> Result<usize, QueryError> {
        let channel = Endpoint::from_shared(endpoint.to_owned())?.connect().await?;
        let mut client = ServerReflectionClient::new(channel);

        let services = list_services(&mut client).await?;
        debug!("reflection at {endpoint} lists {} services", services.len());

        let mut added = 0;
        let mut seen_files = HashSet::new();
        for service in services
            .iter()
            .filter(|service| !service.starts_with(IGNORED_SERVICE_PREFIX))
        {
            for file in file_containing_symbol(&mut client, service).await? {
                let key = file.name().to_owned();
                added += self.register_file_descriptor(&file, Some(service));
                seen_files.insert(key);
            }
        }

        info!(
            "registered {added} query paths from {} files at {endpoint}",
            seen_files.len()
        );

        Ok(added)
    }
}

/**
   Derives the method path of a query request by the Cosmos SDK naming
   convention: `pkg.QueryFooRequest` is served by `/pkg.Query/Foo`.
*/
pub fn conventional_query_path(type_name: &str) -> Result<String, QueryError> {
    let invalid = || QueryError::InvalidTypeName(type_name.to_owned());

    let (package, message) = type_name.rsplit_once('.').ok_or_else(invalid)?;
    let method = message
        .strip_prefix("Query")
        .and_then(|rest| rest.strip_suffix("Request"))
        .filter(|method| !method.is_empty())
        .ok_or_else(invalid)?;

    Ok(format!("/{package}.Query/{method}"))
}

async fn reflect(
    client: &mut ServerReflectionClient<Channel>,
    request: MessageRequest,
) -> Result<MessageResponse, QueryError> {
    let request = ServerReflectionRequest {
        host: String::new(),
        message_request: Some(request),
    };

    let mut stream = client
        .server_reflection_info(tokio_stream::once(request))
        .await?
        .into_inner();

    let response = stream
        .message()
        .await?
        .and_then(|response| response.message_response)
        .ok_or_else(|| QueryError::Reflection("empty reflection response".to_owned()))?;

    match response {
        MessageResponse::ErrorResponse(err) => Err(QueryError::Reflection(err.error_message)),
        response => Ok(response),
    }
}

async fn list_services(client: &mut ServerReflectionClient<Channel>) -> Result<Vec<String>, QueryError> {
    match reflect(client, MessageRequest::ListServices(String::new())).await? {
        MessageResponse::ListServicesResponse(list) => {
            Ok(list.service.into_iter().map(|service| service.name).collect())
        }
        _ => Err(QueryError::Reflection(
            "unexpected response to list services".to_owned(),
        )),
    }
}

async fn file_containing_symbol(
    client: &mut ServerReflectionClient<Channel>,
    symbol: &str,
) -> Result<Vec<FileDescriptorProto>, QueryError> {
    match reflect(client, MessageRequest::FileContainingSymbol(symbol.to_owned())).await? {
        MessageResponse::FileDescriptorResponse(files) => files
            .file_descriptor_proto
            .iter()
            .map(|bytes| FileDescriptorProto::decode(bytes.as_slice()).map_err(QueryError::from))
            .collect(),
        _ => Err(QueryError::Reflection(format!(
            "unexpected response to file containing symbol {symbol}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ibc_proto::ibc::core::client::v1::QueryClientStateRequest;
    use prost_types::{MethodDescriptorProto, ServiceDescriptorProto};

    fn method(name: &str, input: &str) -> MethodDescriptorProto {
        MethodDescriptorProto {
            name: Some(name.to_owned()),
            input_type: Some(input.to_owned()),
            ..Default::default()
        }
    }

    fn client_query_file() -> FileDescriptorProto {
        FileDescriptorProto {
            name: Some("ibc/core/client/v1/query.proto".to_owned()),
            package: Some("ibc.core.client.v1".to_owned()),
            service: vec![
                ServiceDescriptorProto {
                    name: Some("Query".to_owned()),
                    method: vec![
                        method("ClientState", ".ibc.core.client.v1.QueryClientStateRequest"),
                        method("ClientStatus", ".ibc.core.client.v1.QueryClientStatusRequest"),
                    ],
                    ..Default::default()
                },
                ServiceDescriptorProto {
                    name: Some("Msg".to_owned()),
                    method: vec![method("UpdateClient", ".ibc.core.client.v1.MsgUpdateClient")],
                    ..Default::default()
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_register_file_descriptor() {
        let mut registry = QueryPathRegistry::new();

        let added = registry.register_file_descriptor(&client_query_file(), Some("ibc.core.client.v1.Query"));

        assert_eq!(added, 2);
        assert_eq!(
            registry.resolve_for::<QueryClientStateRequest>().unwrap(),
            "/ibc.core.client.v1.Query/ClientState"
        );
        assert!(registry.resolve("ibc.core.client.v1.MsgUpdateClient").is_err());

        assert_eq!(registry.register_file_descriptor(&client_query_file(), None), 1);
        assert_eq!(
            registry.resolve("ibc.core.client.v1.MsgUpdateClient").unwrap(),
            "/ibc.core.client.v1.Msg/UpdateClient"
        );
    }

    #[test]
    fn test_unknown_request_is_an_error() {
        let registry = QueryPathRegistry::new();

        let err = registry.resolve_for::<QueryClientStateRequest>().unwrap_err();

        assert!(matches!(err, QueryError::UnknownRequest(name) if name == "ibc.core.client.v1.QueryClientStateRequest"));
    }

    #[test]
    fn test_conventional_query_path() {
        assert_eq!(
            conventional_query_path("cosmos.bank.v1beta1.QueryBalanceRequest").unwrap(),
            "/cosmos.bank.v1beta1.Query/Balance"
        );
        assert_eq!(
            conventional_query_path("ibc.applications.transfer.v1.QueryTotalEscrowForDenomRequest").unwrap(),
            "/ibc.applications.transfer.v1.Query/TotalEscrowForDenom"
        );
        assert!(conventional_query_path("cosmos.base.tendermint.v1beta1.GetValidatorSetByHeightRequest").is_err());
        assert!(conventional_query_path("ibc.core.client.v1.QueryClientState").is_err());
        assert!(conventional_query_path("QueryBalanceRequest").is_err());
    }

    #[test]
    fn test_register_by_convention() {
        let mut registry = QueryPathRegistry::with_defaults();
        registry.register_by_convention::<QueryClientStateRequest>().unwrap();

        assert_eq!(
            registry.resolve("ibc.core.client.v1.QueryClientStateRequest").unwrap(),
            "/ibc.core.client.v1.Query/ClientState"
        );
        assert_eq!(
            registry.resolve("cosmos.base.tendermint.v1beta1.GetValidatorSetByHeightRequest").unwrap(),
            "/cosmos.base.tendermint.v1beta1.Service/GetValidatorSetByHeight"
        );
    }
}
