// API module
//
// This module contains the HTTP API for the ledger. Handlers are thin
// wrappers over one `Blockchain` injected as app data.

pub mod handlers;
pub mod routes;

use utoipa::OpenApi;

use crate::blockchain;

// Re-export main components for easier access
pub use routes::configure_routes;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::get_chain,
        handlers::get_pending_transactions,
        handlers::new_transaction,
        handlers::mine_block,
        handlers::validate_chain,
        handlers::create_wallet,
        handlers::sign_transaction,
        handlers::get_balance
    ),
    components(
        schemas(
            blockchain::Block,
            blockchain::Transaction,
            blockchain::Address,
            blockchain::DigitalSignature,
            handlers::ChainResponse,
            handlers::TransactionRequest,
            handlers::MineResponse,
            handlers::WalletResponse,
            handlers::SignRequest,
            handlers::BalanceResponse
        )
    ),
    tags(
        (name = "ledger", description = "Ledger API endpoints")
    ),
    info(
        title = "Ledger API",
        version = "0.1.0",
        description = "A single-node proof-of-work ledger",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
pub struct ApiDoc;
