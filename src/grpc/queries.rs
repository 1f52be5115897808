use super::{grpc_query, QueryPathRegistry};
use crate::error::QueryError;
use ibc_proto::{
    cosmos::{
        auth::v1beta1::{ModuleAccount, QueryModuleAccountByNameRequest, QueryModuleAccountByNameResponse},
        bank::v1beta1::{
            Metadata, QueryBalanceRequest, QueryBalanceResponse, QueryDenomMetadataRequest,
            QueryDenomMetadataResponse,
        },
        base::tendermint::v1beta1::{GetValidatorSetByHeightRequest, GetValidatorSetByHeightResponse, Validator},
        gov::v1::{Proposal, QueryProposalRequest, QueryProposalResponse},
    },
    google::protobuf::Any,
    ibc::{
        applications::{
            fee::v1::{
                QueryCounterpartyPayeeRequest, QueryCounterpartyPayeeResponse, QueryFeeEnabledChannelRequest,
                QueryFeeEnabledChannelResponse,
            },
            interchain_accounts::controller::v1::{QueryInterchainAccountRequest, QueryInterchainAccountResponse},
            transfer::v1::{
                Params as TransferParams, QueryParamsRequest as QueryTransferParamsRequest,
                QueryParamsResponse as QueryTransferParamsResponse, QueryTotalEscrowForDenomRequest,
                QueryTotalEscrowForDenomResponse,
            },
        },
        core::{
            channel::v1::{
                Channel, PacketState, QueryChannelRequest, QueryChannelResponse, QueryPacketAcknowledgementRequest,
                QueryPacketAcknowledgementResponse, QueryPacketAcknowledgementsRequest,
                QueryPacketAcknowledgementsResponse, QueryPacketCommitmentRequest, QueryPacketCommitmentResponse,
            },
            client::v1::{
                QueryClientStateRequest, QueryClientStateResponse, QueryClientStatusRequest,
                QueryClientStatusResponse,
            },
        },
    },
};
use prost::{Message, Name};
use std::sync::Arc;

/// The status of a light client that can be updated.
pub const CLIENT_STATUS_ACTIVE: &str = "Active";
pub const CLIENT_STATUS_EXPIRED: &str = "Expired";

/**
   Registers every request type queried by [`GrpcClient`] under its
   conventional path, for chains that do not serve reflection.
*/
pub fn register_known_queries(registry: &mut QueryPathRegistry) -> Result<(), QueryError> {
    registry.register_by_convention::<QueryBalanceRequest>()?;
    registry.register_by_convention::<QueryDenomMetadataRequest>()?;
    registry.register_by_convention::<QueryModuleAccountByNameRequest>()?;
    registry.register_by_convention::<QueryProposalRequest>()?;
    registry.register_by_convention::<QueryChannelRequest>()?;
    registry.register_by_convention::<QueryPacketCommitmentRequest>()?;
    registry.register_by_convention::<QueryPacketAcknowledgementRequest>()?;
    registry.register_by_convention::<QueryPacketAcknowledgementsRequest>()?;
    registry.register_by_convention::<QueryClientStateRequest>()?;
    registry.register_by_convention::<QueryClientStatusRequest>()?;
    registry.register_by_convention::<QueryTotalEscrowForDenomRequest>()?;
    registry.register_by_convention::<QueryTransferParamsRequest>()?;
    registry.register_by_convention::<QueryInterchainAccountRequest>()?;
    registry.register_by_convention::<QueryCounterpartyPayeeRequest>()?;
    registry.register_by_convention::<QueryFeeEnabledChannelRequest>()?;

    Ok(())
}

/// Typed queries against one chain's gRPC endpoint.
#[derive(Debug, Clone)]
pub struct GrpcClient {
    endpoint: String,
    registry: Arc<QueryPathRegistry>,
}

impl GrpcClient {
    pub fn new(endpoint: impl Into<String>, registry: Arc<QueryPathRegistry>) -> Self {
        Self {
            endpoint: endpoint.into(),
            registry,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Sends any registered query request.
    pub async fn query<Req, Resp>(&self, request: Req) -> Result<Resp, QueryError>
    where
        Req: Message + Name + Send + Sync + 'static,
        Resp: Message + Default + Send + Sync + 'static,
    {
        grpc_query(&self.endpoint, &self.registry, request).await
    }

    /// The balance of `denom` held by `address`.
    pub async fn balance(&self, address: &str, denom: &str) -> Result<u128, QueryError> {
        let resp: QueryBalanceResponse = self
            .query(QueryBalanceRequest {
                address: address.to_owned(),
                denom: denom.to_owned(),
            })
            .await?;

        let coin = resp.balance.ok_or(QueryError::MissingField("balance"))?;

        coin.amount
            .parse()
            .map_err(|_| QueryError::InvalidAmount(coin.amount.clone()))
    }

    pub async fn denom_metadata(&self, denom: &str) -> Result<Metadata, QueryError> {
        let resp: QueryDenomMetadataResponse = self
            .query(QueryDenomMetadataRequest {
                denom: denom.to_owned(),
            })
            .await?;

        resp.metadata.ok_or(QueryError::MissingField("metadata"))
    }

    /// The address of the module account called `name`.
    pub async fn module_account_address(&self, name: &str) -> Result<String, QueryError> {
        let resp: QueryModuleAccountByNameResponse = self
            .query(QueryModuleAccountByNameRequest { name: name.to_owned() })
            .await?;

        let any = resp.account.ok_or(QueryError::MissingField("account"))?;
        let account = ModuleAccount::decode(any.value.as_slice())?;

        account
            .base_account
            .map(|base| base.address)
            .ok_or(QueryError::MissingField("base_account"))
    }

    pub async fn proposal(&self, proposal_id: u64) -> Result<Proposal, QueryError> {
        let resp: QueryProposalResponse = self.query(QueryProposalRequest { proposal_id }).await?;

        resp.proposal.ok_or(QueryError::MissingField("proposal"))
    }

    pub async fn channel(&self, port_id: &str, channel_id: &str) -> Result<Channel, QueryError> {
        let resp: QueryChannelResponse = self
            .query(QueryChannelRequest {
                port_id: port_id.to_owned(),
                channel_id: channel_id.to_owned(),
            })
            .await?;

        resp.channel.ok_or(QueryError::MissingField("channel"))
    }

    /// The commitment of an unrelayed packet. Fails once the packet is acknowledged or timed out.
    pub async fn packet_commitment(&self, port_id: &str, channel_id: &str, sequence: u64) -> Result<Vec<u8>, QueryError> {
        let resp: QueryPacketCommitmentResponse = self
            .query(QueryPacketCommitmentRequest {
                port_id: port_id.to_owned(),
                channel_id: channel_id.to_owned(),
                sequence,
            })
            .await?;

        Ok(resp.commitment)
    }

    pub async fn packet_acknowledgement(
        &self,
        port_id: &str,
        channel_id: &str,
        sequence: u64,
    ) -> Result<Vec<u8>, QueryError> {
        let resp: QueryPacketAcknowledgementResponse = self
            .query(QueryPacketAcknowledgementRequest {
                port_id: port_id.to_owned(),
                channel_id: channel_id.to_owned(),
                sequence,
            })
            .await?;

        Ok(resp.acknowledgement)
    }

    /// Acknowledgements on a channel, restricted to `sequences` unless empty.
    pub async fn packet_acknowledgements(
        &self,
        port_id: &str,
        channel_id: &str,
        sequences: Vec<u64>,
    ) -> Result<Vec<PacketState>, QueryError> {
        let resp: QueryPacketAcknowledgementsResponse = self
            .query(QueryPacketAcknowledgementsRequest {
                port_id: port_id.to_owned(),
                channel_id: channel_id.to_owned(),
                packet_commitment_sequences: sequences,
                ..Default::default()
            })
            .await?;

        Ok(resp.acknowledgements)
    }

    pub async fn client_state(&self, client_id: &str) -> Result<Any, QueryError> {
        let resp: QueryClientStateResponse = self
            .query(QueryClientStateRequest {
                client_id: client_id.to_owned(),
            })
            .await?;

        resp.client_state.ok_or(QueryError::MissingField("client_state"))
    }

    /// The status of a client, e.g. `Active`, `Expired` or `Frozen`.
    pub async fn client_status(&self, client_id: &str) -> Result<String, QueryError> {
        let resp: QueryClientStatusResponse = self
            .query(QueryClientStatusRequest {
                client_id: client_id.to_owned(),
            })
            .await?;

        Ok(resp.status)
    }

    /// The amount of `denom` held in escrow by the transfer module.
    pub async fn total_escrow_for_denom(&self, denom: &str) -> Result<u128, QueryError> {
        let resp: QueryTotalEscrowForDenomResponse = self
            .query(QueryTotalEscrowForDenomRequest {
                denom: denom.to_owned(),
            })
            .await?;

        let amount = resp.amount.ok_or(QueryError::MissingField("amount"))?;

        amount
            .amount
            .parse()
            .map_err(|_| QueryError::InvalidAmount(amount.amount.clone()))
    }

    pub async fn transfer_params(&self) -> Result<TransferParams, QueryError> {
        let resp: QueryTransferParamsResponse = self.query(QueryTransferParamsRequest {}).await?;

        resp.params.ok_or(QueryError::MissingField("params"))
    }

    /// The interchain account registered by `owner` over `connection_id`.
    pub async fn interchain_account(&self, owner: &str, connection_id: &str) -> Result<String, QueryError> {
        let resp: QueryInterchainAccountResponse = self
            .query(QueryInterchainAccountRequest {
                owner: owner.to_owned(),
                connection_id: connection_id.to_owned(),
            })
            .await?;

        Ok(resp.address)
    }

    /// The validator set at `height`, sorted by address.
    pub async fn validator_set_by_height(&self, height: i64) -> Result<Vec<Validator>, QueryError> {
        let resp: GetValidatorSetByHeightResponse = self
            .query(GetValidatorSetByHeightRequest {
                height,
                ..Default::default()
            })
            .await?;

        let mut validators = resp.validators;
        validators.sort_by(|a, b| a.address.cmp(&b.address));

        Ok(validators)
    }

    pub async fn counterparty_payee(&self, relayer: &str, channel_id: &str) -> Result<String, QueryError> {
        let resp: QueryCounterpartyPayeeResponse = self
            .query(QueryCounterpartyPayeeRequest {
                channel_id: channel_id.to_owned(),
                relayer: relayer.to_owned(),
            })
            .await?;

        Ok(resp.counterparty_payee)
    }

    pub async fn fee_enabled_channel(&self, port_id: &str, channel_id: &str) -> Result<bool, QueryError> {
        let resp: QueryFeeEnabledChannelResponse = self
            .query(QueryFeeEnabledChannelRequest {
                port_id: port_id.to_owned(),
                channel_id: channel_id.to_owned(),
            })
            .await?;

        Ok(resp.fee_enabled)
    }
}
