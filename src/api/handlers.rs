use actix_web::{web, HttpResponse, Responder};
use log::error;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::blockchain::{
    Address, Block, Blockchain, BlockchainError, DigitalSignature, PublicKey, Transaction, Wallet,
    ENCODING_VERSION, MINING_SENDER,
};

/// Data structure for the blockchain state
pub type BlockchainData = web::Data<Blockchain>;

/// Response for the chain endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ChainResponse {
    /// Version of the canonical encoding the blocks use
    pub encoding_version: u32,

    /// The length of the chain
    pub length: usize,

    /// The blocks in the chain
    pub chain: Vec<Block>,

    /// Whether the chain is valid
    pub is_valid: bool,
}

/// A signed transfer, as submitted to the node and as produced by the sign endpoint
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TransactionRequest {
    /// The sender's address
    pub sender_blockchain_address: String,

    /// The recipient's address
    #[serde(rename = "recepient_blockchain_address")]
    pub recipient_blockchain_address: String,

    /// The amount to transfer
    pub value: f32,

    /// The sender's public key, hex of x || y
    pub sender_public_key: String,

    /// Signature over the transaction digest, hex of r || s
    pub signature: String,
}

/// Response for the mine endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct MineResponse {
    /// The message
    pub message: String,

    /// The newly mined block
    pub block: Block,
}

/// Response for the create wallet endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct WalletResponse {
    /// The wallet's address
    pub address: String,

    /// The wallet's public key (hex of x || y)
    pub public_key: String,

    /// The wallet's private key (hex encoded)
    pub private_key: String,
}

/// Request for the sign endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct SignRequest {
    /// The sender's private key (hex encoded)
    pub private_key: String,

    /// The recipient's address
    #[serde(rename = "recepient_blockchain_address")]
    pub recipient_blockchain_address: String,

    /// The amount to transfer
    pub value: f32,
}

/// Response for the balance endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct BalanceResponse {
    pub address: String,
    pub balance: f32,
}

fn error_response(status: actix_web::http::StatusCode, message: String) -> HttpResponse {
    HttpResponse::build(status).json(serde_json::json!({ "error": message }))
}

/// Get the full blockchain
///
/// Returns the entire blockchain and its validity status
#[utoipa::path(
    get,
    path = "/api/v1/chain",
    responses(
        (status = 200, description = "Blockchain retrieved successfully", body = ChainResponse)
    )
)]
pub async fn get_chain(blockchain: BlockchainData) -> impl Responder {
    let chain = blockchain.chain();
    let is_valid = blockchain.is_valid();

    let response = ChainResponse {
        encoding_version: ENCODING_VERSION,
        length: chain.len(),
        chain,
        is_valid,
    };

    HttpResponse::Ok().json(response)
}

/// Get all pending transactions
///
/// Returns all transactions waiting to be included in a block
#[utoipa::path(
    get,
    path = "/api/v1/transactions/pending",
    responses(
        (status = 200, description = "Pending transactions retrieved successfully", body = Vec<Transaction>)
    )
)]
pub async fn get_pending_transactions(blockchain: BlockchainData) -> impl Responder {
    let pending: Vec<Transaction> = blockchain.copy_pending_pool();
    HttpResponse::Ok().json(pending)
}

/// Submit a signed transaction
///
/// Adds the transaction to the pending pool if its signature verifies
#[utoipa::path(
    post,
    path = "/api/v1/transactions",
    request_body = TransactionRequest,
    responses(
        (status = 201, description = "Transaction accepted"),
        (status = 400, description = "Malformed or rejected transaction")
    )
)]
pub async fn new_transaction(
    blockchain: BlockchainData,
    transaction_req: web::Json<TransactionRequest>,
) -> impl Responder {
    use actix_web::http::StatusCode;

    // Rewards are only ever paid by the node itself
    if transaction_req.sender_blockchain_address == MINING_SENDER {
        return error_response(StatusCode::BAD_REQUEST, "Reserved sender address".to_string());
    }

    // Out-of-range JSON numbers such as 1e39 parse to infinity
    if !transaction_req.value.is_finite() {
        return error_response(StatusCode::BAD_REQUEST, "Value must be finite".to_string());
    }

    let public_key = match PublicKey::from_hex(&transaction_req.sender_public_key) {
        Ok(public_key) => public_key,
        Err(err) => {
            return error_response(StatusCode::BAD_REQUEST, format!("Invalid public key: {}", err));
        }
    };

    let signature = DigitalSignature(transaction_req.signature.clone());

    let accepted = blockchain.add_transaction(
        transaction_req.sender_blockchain_address.as_str(),
        transaction_req.recipient_blockchain_address.as_str(),
        transaction_req.value,
        Some(&public_key),
        Some(&signature),
    );

    if accepted {
        HttpResponse::Created().json(serde_json::json!({ "message": "success" }))
    } else {
        error_response(StatusCode::BAD_REQUEST, "Transaction rejected".to_string())
    }
}

/// Mine a new block
///
/// Seals all pending transactions into a new block, paying the reward to the node
#[utoipa::path(
    post,
    path = "/api/v1/mine",
    responses(
        (status = 200, description = "Block mined successfully", body = MineResponse),
        (status = 409, description = "A block is already being mined"),
        (status = 500, description = "Mining failed")
    )
)]
pub async fn mine_block(blockchain: BlockchainData) -> impl Responder {
    use actix_web::http::StatusCode;

    let ledger = blockchain.clone();
    match web::block(move || ledger.mine()).await {
        Ok(Ok(block)) => HttpResponse::Ok().json(MineResponse {
            message: "New Block Mined".to_string(),
            block,
        }),
        Ok(Err(BlockchainError::MiningInProgress)) => error_response(
            StatusCode::CONFLICT,
            BlockchainError::MiningInProgress.to_string(),
        ),
        Ok(Err(err)) => {
            error!("Mining failed: {}", err);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to mine block: {}", err),
            )
        }
        Err(err) => {
            error!("Mining task failed: {}", err);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

/// Check if the blockchain is valid
///
/// Validates every link and proof in the chain
#[utoipa::path(
    get,
    path = "/api/v1/validate",
    responses(
        (status = 200, description = "Blockchain validation status", body = bool)
    )
)]
pub async fn validate_chain(blockchain: BlockchainData) -> impl Responder {
    HttpResponse::Ok().json(blockchain.is_valid())
}

/// Create a new wallet
///
/// Creates a new wallet with a random keypair
///
/// The private key must be stored by your own
#[utoipa::path(
    post,
    path = "/api/v1/wallet/new",
    responses(
        (status = 201, description = "Wallet created successfully", body = WalletResponse)
    )
)]
pub async fn create_wallet() -> impl Responder {
    let wallet = Wallet::new();

    HttpResponse::Created().json(WalletResponse {
        address: wallet.address().to_string(),
        public_key: wallet.public_key().to_hex(),
        private_key: wallet.private_key().to_hex(),
    })
}

/// Sign a transfer
///
/// Builds a transfer from the wallet of the given private key and signs it.
/// The response can be submitted unchanged to the transactions endpoint.
#[utoipa::path(
    post,
    path = "/api/v1/wallet/sign",
    request_body = SignRequest,
    responses(
        (status = 200, description = "Transaction signed", body = TransactionRequest),
        (status = 400, description = "Invalid private key or value")
    )
)]
pub async fn sign_transaction(sign_req: web::Json<SignRequest>) -> impl Responder {
    use actix_web::http::StatusCode;

    if !sign_req.value.is_finite() {
        return error_response(StatusCode::BAD_REQUEST, "Value must be finite".to_string());
    }

    let wallet = match Wallet::from_private_key_hex(&sign_req.private_key) {
        Ok(wallet) => wallet,
        Err(err) => {
            return error_response(StatusCode::BAD_REQUEST, format!("Invalid private key: {}", err));
        }
    };

    let recipient = Address(sign_req.recipient_blockchain_address.clone());
    match wallet.sign_transfer(recipient, sign_req.value) {
        Ok((transaction, signature)) => HttpResponse::Ok().json(TransactionRequest {
            sender_blockchain_address: transaction.sender().to_string(),
            recipient_blockchain_address: transaction.recipient().to_string(),
            value: transaction.value(),
            sender_public_key: wallet.public_key().to_hex(),
            signature: signature.0,
        }),
        Err(err) => {
            error!("Signing failed: {}", err);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

/// Get the balance of an address
///
/// Replays the whole chain to compute the balance
#[utoipa::path(
    get,
    path = "/api/v1/balance/{address}",
    params(
        ("address" = String, Path, description = "Address to compute the balance of")
    ),
    responses(
        (status = 200, description = "Balance computed", body = BalanceResponse)
    )
)]
pub async fn get_balance(blockchain: BlockchainData, address: web::Path<String>) -> impl Responder {
    let address = Address(address.into_inner());
    let balance = blockchain.total_balance(&address);

    HttpResponse::Ok().json(BalanceResponse {
        address: address.0,
        balance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::configure_routes;
    use crate::config::LedgerConfig;
    use actix_web::{
        http::{header::ContentType, StatusCode},
        test, App,
    };

    fn test_ledger(miner: &str) -> BlockchainData {
        web::Data::new(
            Blockchain::new(
                miner,
                LedgerConfig {
                    difficulty: 1,
                    ..LedgerConfig::default()
                },
            )
            .unwrap(),
        )
    }

    #[actix_web::test]
    async fn test_get_chain() {
        let app = test::init_service(
            App::new()
                .app_data(test_ledger("miner"))
                .configure(configure_routes),
        )
        .await;

        for uri in ["/", "/api/v1/chain"] {
            let req = test::TestRequest::get().uri(uri).to_request();
            let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

            assert_eq!(body["length"], 1);
            assert_eq!(body["is_valid"], true);
            assert_eq!(body["encoding_version"], ENCODING_VERSION);
            assert_eq!(body["chain"][0]["nonce"], 0);
            assert!(body["chain"][0]["previousHash"].is_string());
            assert!(body["chain"][0]["transactions"].as_array().unwrap().is_empty());
        }
    }

    #[actix_web::test]
    async fn test_wallet_sign_submit_mine_balance() {
        let app = test::init_service(
            App::new()
                .app_data(test_ledger("miner"))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post().uri("/api/v1/wallet/new").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let wallet: WalletResponse = test::read_body_json(resp).await;
        assert!(Address(wallet.address.clone()).is_valid());

        let req = test::TestRequest::post()
            .uri("/api/v1/wallet/sign")
            .set_json(SignRequest {
                private_key: wallet.private_key.clone(),
                recipient_blockchain_address: "Morty".to_string(),
                value: 4.0,
            })
            .to_request();
        let signed: TransactionRequest = test::call_and_read_body_json(&app, req).await;
        assert_eq!(signed.sender_blockchain_address, wallet.address);
        assert_eq!(signed.sender_public_key, wallet.public_key);

        let req = test::TestRequest::post()
            .uri("/api/v1/transactions")
            .set_json(signed.clone())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let req = test::TestRequest::get()
            .uri("/api/v1/transactions/pending")
            .to_request();
        let pending: Vec<Transaction> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(pending.len(), 1);

        let req = test::TestRequest::post().uri("/api/v1/mine").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let mined: MineResponse = test::read_body_json(resp).await;
        assert_eq!(mined.block.transactions().len(), 2);

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/balance/{}", wallet.address))
            .to_request();
        let balance: BalanceResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(balance.balance, -4.0);

        let req = test::TestRequest::get().uri("/api/v1/balance/miner").to_request();
        let balance: BalanceResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(balance.balance, 1.0);

        let req = test::TestRequest::get().uri("/api/v1/validate").to_request();
        let valid: bool = test::call_and_read_body_json(&app, req).await;
        assert!(valid);
    }

    #[actix_web::test]
    async fn test_rejects_tampered_submission() {
        let app = test::init_service(
            App::new()
                .app_data(test_ledger("miner"))
                .configure(configure_routes),
        )
        .await;

        let wallet = Wallet::new();
        let (transaction, signature) = wallet.sign_transfer("Morty", 4.0).unwrap();
        let mut request = TransactionRequest {
            sender_blockchain_address: transaction.sender().to_string(),
            recipient_blockchain_address: "Morty".to_string(),
            value: 40.0,
            sender_public_key: wallet.public_key().to_hex(),
            signature: signature.0,
        };

        let req = test::TestRequest::post()
            .uri("/api/v1/transactions")
            .set_json(request.clone())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        request.sender_public_key = "00".to_string();
        let req = test::TestRequest::post()
            .uri("/api/v1/transactions")
            .set_json(request.clone())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        request.sender_blockchain_address = MINING_SENDER.to_string();
        let req = test::TestRequest::post()
            .uri("/api/v1/transactions")
            .set_json(request)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::get()
            .uri("/api/v1/transactions/pending")
            .to_request();
        let pending: Vec<Transaction> = test::call_and_read_body_json(&app, req).await;
        assert!(pending.is_empty());
    }

    #[actix_web::test]
    async fn test_sign_rejects_bad_key() {
        let app = test::init_service(App::new().configure(configure_routes)).await;

        let req = test::TestRequest::post()
            .uri("/api/v1/wallet/sign")
            .set_json(SignRequest {
                private_key: "not-a-key".to_string(),
                recipient_blockchain_address: "Morty".to_string(),
                value: 1.0,
            })
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_rejects_out_of_range_values() {
        let app = test::init_service(
            App::new()
                .app_data(test_ledger("miner"))
                .configure(configure_routes),
        )
        .await;

        let wallet = Wallet::new();
        let (transaction, signature) = wallet.sign_transfer("Morty", 4.0).unwrap();

        for value in ["1e39", "-1e39"] {
            let body = format!(
                r#"{{"sender_blockchain_address":"{}","recepient_blockchain_address":"Morty","value":{},"sender_public_key":"{}","signature":"{}"}}"#,
                transaction.sender(),
                value,
                wallet.public_key().to_hex(),
                signature
            );
            let req = test::TestRequest::post()
                .uri("/api/v1/transactions")
                .insert_header(ContentType::json())
                .set_payload(body)
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

            let body = format!(
                r#"{{"private_key":"{}","recepient_blockchain_address":"Morty","value":{}}}"#,
                wallet.private_key().to_hex(),
                value
            );
            let req = test::TestRequest::post()
                .uri("/api/v1/wallet/sign")
                .insert_header(ContentType::json())
                .set_payload(body)
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        }

        let req = test::TestRequest::get()
            .uri("/api/v1/transactions/pending")
            .to_request();
        let pending: Vec<Transaction> = test::call_and_read_body_json(&app, req).await;
        assert!(pending.is_empty());
    }

    #[actix_web::test]
    async fn test_requests_use_transaction_field_names() {
        let request = SignRequest {
            private_key: "00".to_string(),
            recipient_blockchain_address: "Morty".to_string(),
            value: 1.0,
        };
        let encoded = serde_json::to_value(&request).unwrap();
        assert_eq!(encoded["recepient_blockchain_address"], "Morty");
        assert!(encoded.get("recipient_blockchain_address").is_none());

        let app = test::init_service(App::new().configure(configure_routes)).await;
        let wallet = Wallet::new();
        let body = serde_json::json!({
            "private_key": wallet.private_key().to_hex(),
            "recepient_blockchain_address": "Morty",
            "value": 2.5,
        });
        let req = test::TestRequest::post()
            .uri("/api/v1/wallet/sign")
            .set_json(body)
            .to_request();
        let signed: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(signed["recepient_blockchain_address"], "Morty");
        assert_eq!(signed["sender_blockchain_address"], wallet.address().as_str());
        assert_eq!(signed["value"], 2.5);
    }
}
