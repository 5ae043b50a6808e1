//! Calldata derivation.
//!
//! A submission carries either raw hex calldata or a human-readable
//! function signature with JSON arguments. Supplying both is rejected
//! rather than silently preferring one.

use crate::error::ValidationError;
use crate::types::SubmitRequest;
use ethers::abi::{HumanReadableParser, ParamType, Token};
use ethers::types::{Address, Bytes, U256};

pub fn derive_calldata(request: &SubmitRequest) -> Result<Bytes, ValidationError> {
    match (&request.function_signature, &request.data) {
        (Some(_), Some(_)) => Err(ValidationError::ConflictingCalldata),
        (Some(signature), None) => {
            let args = request.function_args.as_deref().unwrap_or(&[]);
            encode_call(signature, args)
        }
        (None, Some(data)) => parse_hex(data),
        (None, None) => Ok(Bytes::new()),
    }
}

/// ABI-encodes a call to `signature` with the given JSON arguments.
pub fn encode_call(
    signature: &str,
    args: &[serde_json::Value],
) -> Result<Bytes, ValidationError> {
    let function =
        HumanReadableParser::parse_function(signature).map_err(|e| ValidationError::AbiEncoding {
            signature: signature.to_string(),
            reason: e.to_string(),
        })?;

    if function.inputs.len() != args.len() {
        return Err(ValidationError::AbiEncoding {
            signature: signature.to_string(),
            reason: format!(
                "expected {} arguments, got {}",
                function.inputs.len(),
                args.len()
            ),
        });
    }

    let tokens = function
        .inputs
        .iter()
        .zip(args)
        .map(|(param, value)| coerce_token(&param.kind, value))
        .collect::<Result<Vec<Token>, String>>()
        .map_err(|reason| ValidationError::AbiEncoding {
            signature: signature.to_string(),
            reason,
        })?;

    function
        .encode_input(&tokens)
        .map(Bytes::from)
        .map_err(|e| ValidationError::AbiEncoding {
            signature: signature.to_string(),
            reason: e.to_string(),
        })
}

fn coerce_token(kind: &ParamType, value: &serde_json::Value) -> Result<Token, String> {
    match kind {
        ParamType::Address => {
            let raw = value.as_str().ok_or("address argument must be a string")?;
            let address: Address = raw
                .parse()
                .map_err(|_| format!("invalid address '{}'", raw))?;
            Ok(Token::Address(address))
        }
        ParamType::Uint(_) => Ok(Token::Uint(coerce_uint(value)?)),
        ParamType::Int(_) => Ok(Token::Int(coerce_uint(value)?)),
        ParamType::Bool => value
            .as_bool()
            .map(Token::Bool)
            .ok_or_else(|| "bool argument must be true or false".to_string()),
        ParamType::String => value
            .as_str()
            .map(|s| Token::String(s.to_string()))
            .ok_or_else(|| "string argument must be a string".to_string()),
        ParamType::Bytes => {
            let raw = value.as_str().ok_or("bytes argument must be a hex string")?;
            let bytes = decode_hex(raw)?;
            Ok(Token::Bytes(bytes))
        }
        ParamType::FixedBytes(size) => {
            let raw = value.as_str().ok_or("bytes argument must be a hex string")?;
            let bytes = decode_hex(raw)?;
            if bytes.len() != *size {
                return Err(format!("expected {} bytes, got {}", size, bytes.len()));
            }
            Ok(Token::FixedBytes(bytes))
        }
        other => Err(format!("unsupported argument type '{}'", other)),
    }
}

fn coerce_uint(value: &serde_json::Value) -> Result<U256, String> {
    if let Some(n) = value.as_u64() {
        return Ok(U256::from(n));
    }
    let raw = value
        .as_str()
        .ok_or("numeric argument must be a number or decimal string")?;
    if let Some(hex) = raw.strip_prefix("0x") {
        U256::from_str_radix(hex, 16).map_err(|_| format!("invalid hex integer '{}'", raw))
    } else {
        U256::from_dec_str(raw).map_err(|_| format!("invalid decimal integer '{}'", raw))
    }
}

fn parse_hex(data: &str) -> Result<Bytes, ValidationError> {
    decode_hex(data)
        .map(Bytes::from)
        .map_err(|reason| ValidationError::InvalidData { reason })
}

fn decode_hex(raw: &str) -> Result<Vec<u8>, String> {
    let stripped = raw.strip_prefix("0x").unwrap_or(raw);
    hex::decode(stripped).map_err(|e| e.to_string())
}
