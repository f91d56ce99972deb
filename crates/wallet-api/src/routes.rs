use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{json, Value};

use coininfo::Coin;
use wallet_core::autopay::{self, NewAutomaticPayment};
use wallet_core::models::{
    make_tx_ref, Account, AccountAddressInfo, AutomaticPayment, PaymentKind,
};
use wallet_core::{AccountChain, AppContext, Wallet};

use crate::auth::AuthedManager;
use crate::error::ApiError;
use crate::requests::{AutoPaymentRequest, CreateAccountRequest, Destination, SendRequest};

pub fn router(state: Arc<AppContext>) -> Router {
    Router::new()
        .route("/accounts/", get(list_accounts).post(create_account))
        .route("/accounts/:user/", get(get_account))
        .route("/accounts/:user/autopayments/", get(list_autopayments))
        .route(
            "/accounts/:user/autopayments/:coin/",
            get(list_autopayments_for_coin)
                .put(replace_autopayments)
                .post(add_autopayment)
                .delete(delete_autopayments),
        )
        .route("/accounts/:user/send/", post(send))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct AccountView {
    user: String,
    addresses: Vec<AccountAddressInfo>,
}

#[derive(Debug, Serialize)]
struct AutoPaymentView {
    id: i64,
    coin: String,
    address: String,
    payment: PaymentKind,
    interval: i64,
    nextpayment: NaiveDateTime,
}

#[derive(Debug, Serialize)]
struct SendResponse {
    txid: String,
    fee: Decimal,
    destination: String,
    href: String,
}

async fn account_view(ctx: &AppContext, account: &Account) -> Result<AccountView, ApiError> {
    let mut addresses = Vec::new();
    for coin in ctx.registry.coins() {
        let chain = AccountChain::new(ctx, account, coin);
        addresses.extend(chain.address_infos().await?);
    }
    Ok(AccountView {
        user: account.user.clone(),
        addresses,
    })
}

fn autopayment_view(ctx: &AppContext, payment: &AutomaticPayment) -> Result<AutoPaymentView, ApiError> {
    let coin = ctx
        .registry
        .by_ticker(&payment.coin)
        .map_err(wallet_core::WalletError::from)?;
    let address = coin
        .encode_address(&payment.pubkeyhash, payment.txout_type()?)
        .map_err(wallet_core::WalletError::from)?;
    Ok(AutoPaymentView {
        id: payment.id,
        coin: payment.coin.clone(),
        address,
        payment: payment.kind(),
        interval: payment.interval,
        nextpayment: payment.nextpayment,
    })
}

async fn find_account(wallet: &Wallet<'_>, user: &str) -> Result<Account, ApiError> {
    wallet
        .account(user)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("unknown account: {user}")))
}

async fn list_accounts(
    State(state): State<Arc<AppContext>>,
    AuthedManager(manager): AuthedManager,
) -> Result<Json<Vec<AccountView>>, ApiError> {
    let wallet = Wallet {
        ctx: &state,
        manager,
    };
    let mut views = Vec::new();
    for account in wallet.accounts().await? {
        views.push(account_view(&state, &account).await?);
    }
    Ok(Json(views))
}

async fn create_account(
    State(state): State<Arc<AppContext>>,
    AuthedManager(manager): AuthedManager,
    Json(request): Json<CreateAccountRequest>,
) -> Result<Json<AccountView>, ApiError> {
    let wallet = Wallet {
        ctx: &state,
        manager,
    };
    let account = match &request.privkey {
        Some(wif) => wallet.import_account(&request.user, wif).await?,
        None => wallet.create_account(&request.user).await?,
    };
    Ok(Json(account_view(&state, &account).await?))
}

async fn get_account(
    State(state): State<Arc<AppContext>>,
    AuthedManager(manager): AuthedManager,
    Path(user): Path<String>,
) -> Result<Json<AccountView>, ApiError> {
    let wallet = Wallet {
        ctx: &state,
        manager,
    };
    let account = find_account(&wallet, &user).await?;
    Ok(Json(account_view(&state, &account).await?))
}

async fn list_autopayments(
    State(state): State<Arc<AppContext>>,
    AuthedManager(manager): AuthedManager,
    Path(user): Path<String>,
) -> Result<Json<Vec<AutoPaymentView>>, ApiError> {
    let wallet = Wallet {
        ctx: &state,
        manager,
    };
    let account = find_account(&wallet, &user).await?;
    let payments = autopay::list_for_account(&state, account.id, None).await?;
    payments
        .iter()
        .map(|payment| autopayment_view(&state, payment))
        .collect::<Result<Vec<_>, _>>()
        .map(Json)
}

async fn list_autopayments_for_coin(
    State(state): State<Arc<AppContext>>,
    AuthedManager(manager): AuthedManager,
    Path((user, coin)): Path<(String, String)>,
) -> Result<Json<Vec<AutoPaymentView>>, ApiError> {
    let wallet = Wallet {
        ctx: &state,
        manager,
    };
    let account = find_account(&wallet, &user).await?;
    let coin = state
        .registry
        .by_ticker(&coin)
        .map_err(wallet_core::WalletError::from)?;
    let payments = autopay::list_for_account(&state, account.id, Some(&coin.ticker)).await?;
    payments
        .iter()
        .map(|payment| autopayment_view(&state, payment))
        .collect::<Result<Vec<_>, _>>()
        .map(Json)
}

/// Turn an API rule into its storable form, classifying the destination
/// address against the coin.
fn parse_rule(coin: &Coin, request: &AutoPaymentRequest) -> Result<NewAutomaticPayment, ApiError> {
    let (pubkeyhash, txout_type) = coin
        .decode_address_and_type(&request.address)
        .ok_or_else(|| {
            ApiError::bad_request(
                "InvalidEncoding",
                format!("invalid destination address: {}", request.address),
            )
        })?;
    Ok(NewAutomaticPayment {
        pubkeyhash,
        txout_type,
        kind: request.payment,
        interval: request.interval,
    })
}

async fn replace_autopayments(
    State(state): State<Arc<AppContext>>,
    AuthedManager(manager): AuthedManager,
    Path((user, coin)): Path<(String, String)>,
    Json(requests): Json<Vec<AutoPaymentRequest>>,
) -> Result<Json<Vec<AutoPaymentView>>, ApiError> {
    let wallet = Wallet {
        ctx: &state,
        manager,
    };
    let account = find_account(&wallet, &user).await?;
    let coin = state
        .registry
        .by_ticker(&coin)
        .map_err(wallet_core::WalletError::from)?;

    let rules = requests
        .iter()
        .map(|request| parse_rule(coin, request))
        .collect::<Result<Vec<_>, _>>()?;
    autopay::replace_for_coin(&state, account.id, &coin.ticker, &rules).await?;

    let payments = autopay::list_for_account(&state, account.id, Some(&coin.ticker)).await?;
    payments
        .iter()
        .map(|payment| autopayment_view(&state, payment))
        .collect::<Result<Vec<_>, _>>()
        .map(Json)
}

async fn add_autopayment(
    State(state): State<Arc<AppContext>>,
    AuthedManager(manager): AuthedManager,
    Path((user, coin)): Path<(String, String)>,
    Json(request): Json<AutoPaymentRequest>,
) -> Result<Json<Vec<AutoPaymentView>>, ApiError> {
    let wallet = Wallet {
        ctx: &state,
        manager,
    };
    let account = find_account(&wallet, &user).await?;
    let coin = state
        .registry
        .by_ticker(&coin)
        .map_err(wallet_core::WalletError::from)?;

    let rule = parse_rule(coin, &request)?;
    autopay::insert(&state, account.id, &coin.ticker, &rule).await?;

    let payments = autopay::list_for_account(&state, account.id, Some(&coin.ticker)).await?;
    payments
        .iter()
        .map(|payment| autopayment_view(&state, payment))
        .collect::<Result<Vec<_>, _>>()
        .map(Json)
}

async fn delete_autopayments(
    State(state): State<Arc<AppContext>>,
    AuthedManager(manager): AuthedManager,
    Path((user, coin)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let wallet = Wallet {
        ctx: &state,
        manager,
    };
    let account = find_account(&wallet, &user).await?;
    let coin = state
        .registry
        .by_ticker(&coin)
        .map_err(wallet_core::WalletError::from)?;
    let deleted = autopay::delete_for_coin(&state, account.id, &coin.ticker).await?;
    Ok(Json(json!({ "deleted": deleted })))
}

async fn resolve_destination(
    wallet: &Wallet<'_>,
    coin: &Coin,
    destination: &Destination,
) -> Result<String, ApiError> {
    match destination {
        Destination::Address { address } => {
            if !coin.valid_address(address) {
                return Err(ApiError::bad_request(
                    "InvalidEncoding",
                    format!("invalid destination address: {address}"),
                ));
            }
            Ok(address.clone())
        }
        Destination::Account {
            user,
            allow_create_new,
        } => {
            let account = match wallet.account(user).await? {
                Some(account) => account,
                None if *allow_create_new => wallet.create_account(user).await?,
                None => {
                    return Err(ApiError::bad_request(
                        "UnknownAccount",
                        format!("unknown destination account: {user}"),
                    ))
                }
            };
            let chain = AccountChain::new(wallet.ctx, &account, coin);
            Ok(chain.preferred_address()?)
        }
    }
}

async fn send(
    State(state): State<Arc<AppContext>>,
    AuthedManager(manager): AuthedManager,
    Path(user): Path<String>,
    Json(request): Json<SendRequest>,
) -> Result<Json<SendResponse>, ApiError> {
    let wallet = Wallet {
        ctx: &state,
        manager,
    };
    let account = find_account(&wallet, &user).await?;
    let coin = state
        .registry
        .by_ticker(&request.coin)
        .map_err(wallet_core::WalletError::from)?;

    let destination = resolve_destination(&wallet, coin, &request.destination).await?;

    let chain = AccountChain::new(&state, &account, coin);
    let signed = chain
        .send(&destination, request.amount, false, request.subsidized())
        .await?;
    let fee = signed.fee;
    let txid = chain.broadcast(&signed, false).await?;
    let href = make_tx_ref(&state.config.indexer, &coin.ticker, &txid);

    Ok(Json(SendResponse {
        txid,
        fee,
        destination,
        href,
    }))
}
