//! # JSON-RPC Methods
//!
//! Maps `hena_*` method names onto [`TokenService`] operations. Parameters
//! are always named (a JSON object). State-changing methods take the caller
//! identity from the `caller` parameter; the instant comes from the node's
//! clock and is fixed for the whole call.
//!
//! Amounts travel as decimal strings in both directions. A JSON number is
//! tolerated on input and run through the same parser, so negative and
//! fractional values are rejected the same way.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use hena_token::error::TokenError;
use hena_token::service::{LockSchedule, TokenService};
use hena_token::types::{parse_amount, Address, Amount, LockKind, Timestamp};
use hena_token::CallContext;

// ---------------------------------------------------------------------------
// Wire Types
// ---------------------------------------------------------------------------

/// A JSON-RPC 2.0 request envelope.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    /// Protocol version. Must be "2.0".
    pub jsonrpc: String,
    /// The method to invoke.
    pub method: String,
    /// Named method parameters.
    pub params: Option<Value>,
    /// Request identifier. Echoed back in the response.
    pub id: Value,
}

/// A JSON-RPC 2.0 response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Protocol version. Always "2.0".
    pub jsonrpc: String,
    /// The result on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// The error on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    /// Request identifier, echoed from the request.
    pub id: Value,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn failure(id: Value, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            result: None,
            error: Some(error),
            id,
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Numeric error code.
    pub code: i32,
    /// Short human-readable error description.
    pub message: String,
    /// Optional structured error data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;

/// Why a call did not produce a result.
#[derive(Debug)]
pub enum RpcFailure {
    MethodNotFound(String),
    InvalidParams(String),
    Token(TokenError),
}

impl From<TokenError> for RpcFailure {
    fn from(err: TokenError) -> Self {
        RpcFailure::Token(err)
    }
}

impl From<RpcFailure> for JsonRpcError {
    fn from(failure: RpcFailure) -> Self {
        match failure {
            RpcFailure::MethodNotFound(method) => JsonRpcError {
                code: METHOD_NOT_FOUND,
                message: format!("Method not found: {}", method),
                data: None,
            },
            RpcFailure::InvalidParams(msg) => JsonRpcError {
                code: INVALID_PARAMS,
                message: format!("Invalid params: {}", msg),
                data: None,
            },
            RpcFailure::Token(err) => JsonRpcError {
                code: err.kind().rpc_code(),
                message: err.to_string(),
                data: Some(json!({ "kind": err.kind() })),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Typed access to a named-parameter object.
pub struct Params<'a>(&'a Map<String, Value>);

impl<'a> Params<'a> {
    /// Wraps `params`, which must be absent or an object.
    pub fn new(params: Option<&'a Value>, empty: &'a Map<String, Value>) -> Result<Self, RpcFailure> {
        match params {
            None | Some(Value::Null) => Ok(Params(empty)),
            Some(Value::Object(map)) => Ok(Params(map)),
            Some(_) => Err(RpcFailure::InvalidParams(
                "params must be an object of named parameters".into(),
            )),
        }
    }

    fn get(&self, key: &str) -> Result<&'a Value, RpcFailure> {
        self.0
            .get(key)
            .filter(|v| !v.is_null())
            .ok_or_else(|| RpcFailure::InvalidParams(format!("missing `{}`", key)))
    }

    pub fn address(&self, key: &str) -> Result<Address, RpcFailure> {
        let raw = self
            .get(key)?
            .as_str()
            .ok_or_else(|| RpcFailure::InvalidParams(format!("`{}` must be a string", key)))?;
        Ok(Address::new(raw)?)
    }

    /// Missing or negative amounts are ledger validation failures, not
    /// malformed requests.
    pub fn amount(&self, key: &str) -> Result<Amount, RpcFailure> {
        let raw = match self.0.get(key) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(_) => {
                return Err(RpcFailure::InvalidParams(format!(
                    "`{}` must be a decimal string",
                    key
                )))
            }
        };
        Ok(parse_amount(&raw)?)
    }

    pub fn timestamp(&self, key: &str) -> Result<Timestamp, RpcFailure> {
        self.get(key)?
            .as_i64()
            .ok_or_else(|| RpcFailure::InvalidParams(format!("`{}` must be an integer", key)))
    }

    pub fn timestamps(&self, key: &str) -> Result<Vec<Timestamp>, RpcFailure> {
        self.array(key)?
            .iter()
            .map(|v| {
                v.as_i64().ok_or_else(|| {
                    RpcFailure::InvalidParams(format!("`{}` must hold integers", key))
                })
            })
            .collect()
    }

    pub fn percentages(&self, key: &str) -> Result<Vec<u32>, RpcFailure> {
        self.array(key)?
            .iter()
            .map(|v| {
                v.as_u64()
                    .and_then(|n| u32::try_from(n).ok())
                    .ok_or_else(|| {
                        TokenError::Validation(format!("`{}` must hold non-negative integers", key))
                            .into()
                    })
            })
            .collect()
    }

    pub fn kind(&self, key: &str) -> Result<LockKind, RpcFailure> {
        let code = self
            .get(key)?
            .as_u64()
            .ok_or_else(|| RpcFailure::InvalidParams(format!("`{}` must be 1, 2 or 3", key)))?;
        Ok(LockKind::from_code(code)?)
    }

    pub fn string(&self, key: &str) -> Result<String, RpcFailure> {
        self.get(key)?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| RpcFailure::InvalidParams(format!("`{}` must be a string", key)))
    }

    pub fn flag(&self, key: &str) -> Result<bool, RpcFailure> {
        self.get(key)?
            .as_bool()
            .ok_or_else(|| RpcFailure::InvalidParams(format!("`{}` must be a boolean", key)))
    }

    fn array(&self, key: &str) -> Result<&'a Vec<Value>, RpcFailure> {
        self.get(key)?
            .as_array()
            .ok_or_else(|| RpcFailure::InvalidParams(format!("`{}` must be an array", key)))
    }
}

fn amount_value(amount: Amount) -> Value {
    Value::String(amount.to_string())
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Read-only methods. `None` if `method` is not one of them.
pub fn query(
    service: &TokenService,
    method: &str,
    params: &Params<'_>,
    now: Timestamp,
) -> Option<Result<Value, RpcFailure>> {
    let result = (|| -> Result<Value, RpcFailure> {
        Ok(match method {
            "hena_name" => json!(service.name()),
            "hena_symbol" => json!(service.symbol()),
            "hena_decimals" => json!(service.decimals()),
            "hena_totalSupply" => amount_value(service.total_supply()),
            "hena_owner" => json!(service.owner()),
            "hena_manager" => json!(service.manager()),
            "hena_balanceOf" => amount_value(service.balance_of(&params.address("address")?)),
            "hena_availableBalanceOf" => {
                amount_value(service.available_balance_of(&params.address("address")?, now))
            }
            "hena_lockedBalanceOf" => {
                amount_value(service.locked_balance_of(&params.address("address")?, now))
            }
            "hena_allowance" => amount_value(
                service.allowance(&params.address("owner")?, &params.address("spender")?),
            ),
            "hena_getTag" => json!(service.tag(&params.address("address")?)),
            "hena_isLocked" => json!(service.is_total_locked(&params.address("address")?)),
            "hena_getLockState" => {
                json!(service.lock_state(&params.address("address")?).to_string())
            }
            "hena_isTransferPaused" => json!(service.is_transfer_paused()),
            "hena_isOwnerTransferAvailable" => json!(service.is_owner_transfer_available()),
            "hena_isProtectedAddress" => {
                json!(service.is_protected_address(&params.address("address")?))
            }
            "hena_privilegedGrantAddress" => json!(service.privileged_grant_address()),
            other => return Err(RpcFailure::MethodNotFound(other.to_string())),
        })
    })();
    match result {
        Err(RpcFailure::MethodNotFound(_)) => None,
        other => Some(other),
    }
}

/// Every method [`command`] dispatches.
pub const COMMANDS: &[&str] = &[
    "hena_transfer",
    "hena_transferFrom",
    "hena_approve",
    "hena_increaseAllowance",
    "hena_decreaseAllowance",
    "hena_burn",
    "hena_addLockNormal",
    "hena_addLockStake",
    "hena_removeLockStake",
    "hena_removeLock",
    "hena_setLockAmount",
    "hena_setTag",
    "hena_lock",
    "hena_unlock",
    "hena_stopTransfer",
    "hena_startTransfer",
    "hena_transferOwner",
    "hena_finishTransferOwner",
    "hena_setProtectedAddress",
    "hena_transferReward",
    "hena_transferLocked",
    "hena_setPrivilegedGrantAddress",
];

pub fn is_command(method: &str) -> bool {
    COMMANDS.contains(&method)
}

/// State-changing methods, run under the write lock.
pub fn command(
    service: &mut TokenService,
    method: &str,
    params: &Params<'_>,
    ctx: &CallContext,
) -> Result<Value, RpcFailure> {
    let value = match method {
        "hena_transfer" => json!(service.transfer(ctx, &params.address("to")?, params.amount("amount")?)?),
        "hena_transferFrom" => json!(service.transfer_from(
            ctx,
            &params.address("from")?,
            &params.address("to")?,
            params.amount("amount")?,
        )?),
        "hena_approve" => json!(service.approve(ctx, &params.address("spender")?, params.amount("amount")?)?),
        "hena_increaseAllowance" => json!(service.increase_allowance(
            ctx,
            &params.address("spender")?,
            params.amount("amount")?,
        )?),
        "hena_decreaseAllowance" => json!(service.decrease_allowance(
            ctx,
            &params.address("spender")?,
            params.amount("amount")?,
        )?),
        "hena_burn" => json!(service.burn(ctx, params.amount("amount")?)?),
        "hena_addLockNormal" => {
            let schedules = LockSchedule::zip(
                &params.timestamps("startTimes")?,
                &params.timestamps("endTimes")?,
                &params.percentages("percentages")?,
            )?;
            json!(service.add_lock_normal(ctx, &params.address("target")?, &schedules)?)
        }
        "hena_addLockStake" => json!(service.add_lock_stake(ctx, params.timestamp("end")?, params.amount("amount")?)?),
        "hena_removeLockStake" => json!(service.remove_lock_stake(ctx, params.timestamp("end")?)?),
        "hena_removeLock" => json!(service.remove_lock(
            ctx,
            params.kind("kind")?,
            &params.address("target")?,
            params.timestamp("end")?,
        )?),
        "hena_setLockAmount" => json!(service.set_lock_amount(
            ctx,
            params.kind("kind")?,
            &params.address("target")?,
            params.timestamp("end")?,
            params.amount("amount")?,
        )?),
        "hena_setTag" => json!(service.set_tag(ctx, &params.address("target")?, params.string("tag")?)?),
        "hena_lock" => json!(service.lock(ctx, &params.address("target")?)?),
        "hena_unlock" => json!(service.unlock(ctx, &params.address("target")?)?),
        "hena_stopTransfer" => json!(service.stop_transfer(ctx)?),
        "hena_startTransfer" => json!(service.start_transfer(ctx)?),
        "hena_transferOwner" => json!(service.transfer_owner(
            ctx,
            &params.address("from")?,
            &params.address("to")?,
            params.amount("amount")?,
        )?),
        "hena_finishTransferOwner" => json!(service.finish_transfer_owner(ctx)?),
        "hena_setProtectedAddress" => json!(service.set_protected_address(
            ctx,
            &params.address("address")?,
            params.flag("protected")?,
        )?),
        "hena_transferReward" => json!(service.transfer_reward(
            ctx,
            &params.address("to")?,
            params.amount("amount")?,
            params.timestamp("lockEnd")?,
        )?),
        "hena_transferLocked" => json!(service.transfer_locked(
            ctx,
            &params.address("to")?,
            params.amount("amount")?,
            params.timestamp("lockEnd")?,
        )?),
        "hena_setPrivilegedGrantAddress" => {
            service.set_privileged_grant_address(ctx, params.address("address")?)?;
            Value::Null
        }
        other => return Err(RpcFailure::MethodNotFound(other.to_string())),
    };
    Ok(value)
}
