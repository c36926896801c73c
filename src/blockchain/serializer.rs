//! Binary serialization of transactions and ABI-described action data.
//!
//! Covers the builtin types contract ABIs use in practice. Key and signature
//! types are not encodable here; actions carrying them must arrive pre-packed.

use chrono::NaiveDateTime;
use serde_json::Value;

use crate::blockchain::transaction::Transaction;
use crate::blockchain::types::{Abi, ActionData, ChainError, ChainResult};

const MAX_DEPTH: usize = 64;

/// Little-endian byte sink.
#[derive(Debug, Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn put_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn put_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn put_varuint32(&mut self, mut v: u32) {
        loop {
            let mut byte = (v & 0x7f) as u8;
            v >>= 7;
            if v > 0 {
                byte |= 0x80;
            }
            self.buf.push(byte);
            if v == 0 {
                break;
            }
        }
    }

    pub fn put_varint32(&mut self, v: i32) {
        self.put_varuint32(((v << 1) ^ (v >> 31)) as u32);
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.put_varuint32(bytes.len() as u32);
        self.put_raw(bytes);
    }

    pub fn put_name(&mut self, name: &str) -> ChainResult<()> {
        self.put_u64(name_to_u64(name)?);
        Ok(())
    }
}

fn char_to_symbol(c: u8) -> Option<u64> {
    match c {
        b'a'..=b'z' => Some((c - b'a') as u64 + 6),
        b'1'..=b'5' => Some((c - b'1') as u64 + 1),
        b'.' => Some(0),
        _ => None,
    }
}

/// Encode an account/action name as its 64-bit value.
pub fn name_to_u64(name: &str) -> ChainResult<u64> {
    let bytes = name.as_bytes();
    if bytes.len() > 13 {
        return Err(ChainError::Serialization(format!("name '{}' longer than 13 characters", name)));
    }

    let mut value = 0u64;
    for i in 0..=12 {
        let mut c = match bytes.get(i) {
            Some(&b) => char_to_symbol(b).ok_or_else(|| {
                ChainError::Serialization(format!("invalid character in name '{}'", name))
            })?,
            None => 0,
        };
        if i < 12 {
            c &= 0x1f;
            c <<= 64 - 5 * (i + 1);
        } else {
            if c > 0x0f {
                return Err(ChainError::Serialization(format!("invalid 13th character in name '{}'", name)));
            }
            c &= 0x0f;
        }
        value |= c;
    }
    Ok(value)
}

fn parse_time(value: &str) -> ChainResult<NaiveDateTime> {
    let trimmed = value.trim_end_matches('Z');
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
        .map_err(|e| ChainError::Serialization(format!("invalid time '{}': {}", value, e)))
}

/// Seconds since epoch for a `time_point_sec` string.
pub fn time_point_sec(value: &str) -> ChainResult<u32> {
    let secs = parse_time(value)?.and_utc().timestamp();
    u32::try_from(secs).map_err(|_| ChainError::Serialization(format!("time '{}' out of range", value)))
}

fn symbol_code_bytes(code: &str) -> ChainResult<[u8; 7]> {
    if code.is_empty() || code.len() > 7 || !code.bytes().all(|b| b.is_ascii_uppercase()) {
        return Err(ChainError::Serialization(format!("invalid symbol code '{}'", code)));
    }
    let mut out = [0u8; 7];
    out[..code.len()].copy_from_slice(code.as_bytes());
    Ok(out)
}

fn put_symbol(w: &mut ByteWriter, precision: u8, code: &str) -> ChainResult<()> {
    w.put_u8(precision);
    w.put_raw(&symbol_code_bytes(code)?);
    Ok(())
}

/// Encode `"1.0000 TLOS"` as amount + symbol.
pub fn put_asset(w: &mut ByteWriter, asset: &str) -> ChainResult<()> {
    let invalid = || ChainError::Serialization(format!("invalid asset '{}'", asset));
    let (amount, code) = asset.trim().split_once(' ').ok_or_else(invalid)?;
    let (negative, digits) = match amount.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, amount),
    };
    let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));
    if whole.is_empty() || !whole.bytes().chain(frac.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let precision = u8::try_from(frac.len()).map_err(|_| invalid())?;
    let mut units: i64 = format!("{}{}", whole, frac).parse().map_err(|_| invalid())?;
    if negative {
        units = -units;
    }
    w.put_u64(units as u64);
    put_symbol(w, precision, code.trim())
}

fn as_u128(value: &Value, ty: &str) -> ChainResult<u128> {
    match value {
        Value::Number(n) => n.as_u64().map(u128::from),
        Value::String(s) => s.parse().ok(),
        Value::Bool(b) => Some(*b as u128),
        _ => None,
    }
    .ok_or_else(|| ChainError::Serialization(format!("expected {} but found {}", ty, value)))
}

fn as_i128(value: &Value, ty: &str) -> ChainResult<i128> {
    match value {
        Value::Number(n) => n.as_i64().map(i128::from),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
    .ok_or_else(|| ChainError::Serialization(format!("expected {} but found {}", ty, value)))
}

fn as_str<'v>(value: &'v Value, ty: &str) -> ChainResult<&'v str> {
    value
        .as_str()
        .ok_or_else(|| ChainError::Serialization(format!("expected {} string but found {}", ty, value)))
}

fn unsigned<T: TryFrom<u128>>(value: &Value, ty: &str) -> ChainResult<T> {
    T::try_from(as_u128(value, ty)?)
        .map_err(|_| ChainError::Serialization(format!("value {} out of range for {}", value, ty)))
}

fn signed<T: TryFrom<i128>>(value: &Value, ty: &str) -> ChainResult<T> {
    T::try_from(as_i128(value, ty)?)
        .map_err(|_| ChainError::Serialization(format!("value {} out of range for {}", value, ty)))
}

fn put_checksum(w: &mut ByteWriter, value: &Value, ty: &str, len: usize) -> ChainResult<()> {
    let bytes = hex::decode(as_str(value, ty)?)
        .map_err(|e| ChainError::Serialization(format!("invalid {} hex: {}", ty, e)))?;
    if bytes.len() != len {
        return Err(ChainError::Serialization(format!("{} must be {} bytes", ty, len)));
    }
    w.put_raw(&bytes);
    Ok(())
}

/// Encodes builtin types; returns `false` when `ty` is not a builtin.
fn put_builtin(w: &mut ByteWriter, ty: &str, value: &Value) -> ChainResult<bool> {
    match ty {
        "bool" => w.put_u8(match value {
            Value::Bool(b) => *b as u8,
            _ => unsigned::<u8>(value, ty)?.min(1),
        }),
        "uint8" => w.put_u8(unsigned(value, ty)?),
        "int8" => w.put_u8(signed::<i8>(value, ty)? as u8),
        "uint16" => w.put_u16(unsigned(value, ty)?),
        "int16" => w.put_u16(signed::<i16>(value, ty)? as u16),
        "uint32" => w.put_u32(unsigned(value, ty)?),
        "int32" => w.put_u32(signed::<i32>(value, ty)? as u32),
        "uint64" => w.put_u64(unsigned(value, ty)?),
        "int64" => w.put_u64(signed::<i64>(value, ty)? as u64),
        "uint128" => w.put_raw(&as_u128(value, ty)?.to_le_bytes()),
        "int128" => w.put_raw(&as_i128(value, ty)?.to_le_bytes()),
        "varuint32" => w.put_varuint32(unsigned(value, ty)?),
        "varint32" => w.put_varint32(signed(value, ty)?),
        "float32" | "float64" => {
            let f = match value {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.parse().ok(),
                _ => None,
            }
            .ok_or_else(|| ChainError::Serialization(format!("expected {} but found {}", ty, value)))?;
            if ty == "float32" {
                w.put_raw(&(f as f32).to_le_bytes());
            } else {
                w.put_raw(&f.to_le_bytes());
            }
        }
        "name" => w.put_name(as_str(value, ty)?)?,
        "string" => w.put_bytes(as_str(value, ty)?.as_bytes()),
        "bytes" => {
            let bytes = hex::decode(as_str(value, ty)?)
                .map_err(|e| ChainError::Serialization(format!("invalid bytes hex: {}", e)))?;
            w.put_bytes(&bytes);
        }
        "checksum160" => put_checksum(w, value, ty, 20)?,
        "checksum256" => put_checksum(w, value, ty, 32)?,
        "checksum512" => put_checksum(w, value, ty, 64)?,
        "symbol_code" => {
            let code = symbol_code_bytes(as_str(value, ty)?)?;
            w.put_raw(&code);
            w.put_u8(0);
        }
        "symbol" => {
            let raw = as_str(value, ty)?;
            let (precision, code) = raw
                .split_once(',')
                .ok_or_else(|| ChainError::Serialization(format!("invalid symbol '{}'", raw)))?;
            let precision: u8 = precision
                .parse()
                .map_err(|_| ChainError::Serialization(format!("invalid symbol '{}'", raw)))?;
            put_symbol(w, precision, code)?;
        }
        "asset" => put_asset(w, as_str(value, ty)?)?,
        "extended_asset" => {
            put_asset(w, as_str(&value["quantity"], "asset")?)?;
            w.put_name(as_str(&value["contract"], "name")?)?;
        }
        "time_point_sec" => w.put_u32(time_point_sec(as_str(value, ty)?)?),
        "time_point" => {
            let micros = parse_time(as_str(value, ty)?)?.and_utc().timestamp_micros();
            w.put_u64(micros as u64);
        }
        "public_key" | "signature" | "block_timestamp_type" => {
            return Err(ChainError::Serialization(format!(
                "type '{}' is not supported; provide pre-packed action data",
                ty
            )))
        }
        _ => return Ok(false),
    }
    Ok(true)
}

/// Encodes JSON values according to a contract ABI.
pub struct AbiEncoder<'a> {
    abi: &'a Abi,
}

impl<'a> AbiEncoder<'a> {
    pub fn new(abi: &'a Abi) -> Self {
        Self { abi }
    }

    /// Encode the arguments of `action` into its binary form.
    pub fn encode_action_data(&self, action: &str, value: &Value) -> ChainResult<Vec<u8>> {
        let ty = self
            .abi
            .actions
            .iter()
            .find(|a| a.name == action)
            .map(|a| a.type_name.as_str())
            .ok_or_else(|| ChainError::Serialization(format!("action '{}' not found in ABI", action)))?;

        let mut w = ByteWriter::new();
        self.encode(ty, value, &mut w, 0)?;
        Ok(w.into_bytes())
    }

    fn encode(&self, ty: &str, value: &Value, w: &mut ByteWriter, depth: usize) -> ChainResult<()> {
        if depth > MAX_DEPTH {
            return Err(ChainError::Serialization(format!("type '{}' nests too deeply", ty)));
        }

        if let Some(inner) = ty.strip_suffix('$') {
            if value.is_null() {
                return Ok(());
            }
            return self.encode(inner, value, w, depth + 1);
        }
        if let Some(inner) = ty.strip_suffix('?') {
            if value.is_null() {
                w.put_u8(0);
                return Ok(());
            }
            w.put_u8(1);
            return self.encode(inner, value, w, depth + 1);
        }
        if let Some(inner) = ty.strip_suffix("[]") {
            let items = value
                .as_array()
                .ok_or_else(|| ChainError::Serialization(format!("expected array for {} but found {}", ty, value)))?;
            w.put_varuint32(items.len() as u32);
            for item in items {
                self.encode(inner, item, w, depth + 1)?;
            }
            return Ok(());
        }

        if let Some(alias) = self.abi.types.iter().find(|t| t.new_type_name == ty) {
            return self.encode(&alias.type_name, value, w, depth + 1);
        }
        if put_builtin(w, ty, value)? {
            return Ok(());
        }
        if self.abi.structs.iter().any(|s| s.name == ty) {
            return self.encode_struct(ty, value, w, depth + 1);
        }
        if let Some(variant) = self.abi.variants.iter().find(|v| v.name == ty) {
            let pair = value.as_array().filter(|p| p.len() == 2).ok_or_else(|| {
                ChainError::Serialization(format!("expected [type, value] for variant {}", ty))
            })?;
            let chosen = as_str(&pair[0], "variant type")?;
            let index = variant.types.iter().position(|t| t == chosen).ok_or_else(|| {
                ChainError::Serialization(format!("'{}' is not a member of variant {}", chosen, ty))
            })?;
            w.put_varuint32(index as u32);
            return self.encode(chosen, &pair[1], w, depth + 1);
        }

        Err(ChainError::Serialization(format!("unknown type '{}'", ty)))
    }

    fn encode_struct(&self, name: &str, value: &Value, w: &mut ByteWriter, depth: usize) -> ChainResult<()> {
        let def = self
            .abi
            .structs
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| ChainError::Serialization(format!("unknown struct '{}'", name)))?;

        if !value.is_object() {
            return Err(ChainError::Serialization(format!("expected object for struct {}", name)));
        }
        if !def.base.is_empty() {
            self.encode_struct(&def.base, value, w, depth + 1)?;
        }
        for field in &def.fields {
            let field_value = value.get(&field.name).unwrap_or(&Value::Null);
            self.encode(&field.type_name, field_value, w, depth + 1).map_err(|e| match e {
                ChainError::Serialization(msg) => {
                    ChainError::Serialization(format!("{}.{}: {}", name, field.name, msg))
                }
                other => other,
            })?;
        }
        Ok(())
    }
}

/// Serialize a transaction whose action data is already packed.
pub fn encode_transaction(trx: &Transaction) -> ChainResult<Vec<u8>> {
    let mut w = ByteWriter::new();
    w.put_u32(time_point_sec(&trx.header.expiration)?);
    w.put_u16(trx.header.ref_block_num);
    w.put_u32(trx.header.ref_block_prefix);
    w.put_varuint32(trx.header.max_net_usage_words);
    w.put_u8(trx.header.max_cpu_usage_ms);
    w.put_varuint32(trx.header.delay_sec);

    for actions in [&trx.context_free_actions, &trx.actions] {
        w.put_varuint32(actions.len() as u32);
        for action in actions.iter() {
            w.put_name(&action.account)?;
            w.put_name(&action.name)?;
            w.put_varuint32(action.authorization.len() as u32);
            for auth in &action.authorization {
                w.put_name(&auth.actor)?;
                w.put_name(&auth.permission)?;
            }
            match &action.data {
                ActionData::Packed(hex_data) => {
                    let bytes = hex::decode(hex_data).map_err(|e| {
                        ChainError::Serialization(format!("invalid action data hex for {}: {}", action.name, e))
                    })?;
                    w.put_bytes(&bytes);
                }
                ActionData::Fields(_) => return Err(ChainError::MissingAbi(action.account.clone())),
            }
        }
    }

    w.put_varuint32(trx.transaction_extensions.len() as u32);
    for ext in &trx.transaction_extensions {
        w.put_u16(ext.kind);
        let bytes = hex::decode(&ext.data)
            .map_err(|e| ChainError::Serialization(format!("invalid extension hex: {}", e)))?;
        w.put_bytes(&bytes);
    }

    Ok(w.into_bytes())
}
