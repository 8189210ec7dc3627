//! Helpers over the `tonlib_core` cell codec.
//!
//! Cells, builders, parsers and bag-of-cells serialization come from
//! `tonlib_core`. What lives here is the glue the wallet needs: base64 BOC
//! transport, coin conversion from `u128` and snake-encoded text comments.

use crate::{WalletError, WalletResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use num_bigint::BigUint;
use num_traits::ToPrimitive;
use std::sync::Arc;

pub use tonlib_core::cell::{ArcCell, BagOfCells, Cell, CellBuilder, CellParser, TonCellError};

/// Text bytes that fit next to the 32-bit comment tag in the head cell.
const COMMENT_HEAD_BYTES: usize = 123;

/// Text bytes per continuation cell.
const COMMENT_TAIL_BYTES: usize = 127;

/// Coins value for the cell codec.
pub fn coins(value: u128) -> BigUint {
    BigUint::from(value)
}

/// Coins value read from a cell, as `u128`.
pub fn coins_to_u128(value: &BigUint) -> WalletResult<u128> {
    value
        .to_u128()
        .ok_or_else(|| WalletError::Cell(format!("coins value {} out of range", value)))
}

/// Serialize a single-root BOC (with CRC32C) as standard base64.
pub fn to_boc_base64(cell: &Cell) -> WalletResult<String> {
    let bytes = BagOfCells::from_root(cell.clone()).serialize(true)?;
    Ok(STANDARD.encode(bytes))
}

/// Parse a standard base64 BOC and return its single root.
pub fn from_boc_base64(text: &str) -> WalletResult<ArcCell> {
    let bytes = STANDARD
        .decode(text.trim())
        .map_err(|e| WalletError::Cell(format!("BOC base64: {}", e)))?;
    let root = BagOfCells::parse(&bytes)?.single_root()?.clone();
    Ok(root)
}

/// Build a text comment (`0x00000000` tag + snake-encoded UTF-8).
pub fn comment_cell(text: &str) -> WalletResult<Cell> {
    let bytes = text.as_bytes();
    let (head, rest) = bytes.split_at(bytes.len().min(COMMENT_HEAD_BYTES));

    // Build the continuation chain from the tail so no step recurses.
    let mut tail: Option<ArcCell> = None;
    for chunk in rest.chunks(COMMENT_TAIL_BYTES).rev() {
        let mut builder = CellBuilder::new();
        builder.store_slice(chunk)?;
        if let Some(next) = tail.take() {
            builder.store_reference(&next)?;
        }
        tail = Some(Arc::new(builder.build()?));
    }

    let mut builder = CellBuilder::new();
    builder.store_u32(32, 0)?.store_slice(head)?;
    if let Some(next) = tail {
        builder.store_reference(&next)?;
    }
    Ok(builder.build()?)
}

/// Read snake-encoded bytes from `parser` (positioned inside `cell`),
/// following the chain through `cell`'s reference at `next_ref`.
pub fn load_snake_bytes(
    cell: &Cell,
    parser: &mut CellParser,
    next_ref: usize,
) -> WalletResult<Vec<u8>> {
    let len = parser.remaining_bits() / 8;
    let mut out = parser.load_bytes(len)?;
    let mut next = cell.references().get(next_ref).cloned();
    while let Some(part) = next {
        let mut reader = part.parser();
        let len = reader.remaining_bits() / 8;
        out.extend(reader.load_bytes(len)?);
        next = part.references().first().cloned();
    }
    Ok(out)
}

/// Decode a comment starting at the `parser` position. Non-comment payloads
/// yield `None`.
pub fn parse_comment_at(cell: &Cell, parser: &mut CellParser, next_ref: usize) -> Option<String> {
    if parser.remaining_bits() < 32 || parser.load_u32(32).ok()? != 0 {
        return None;
    }
    let bytes = load_snake_bytes(cell, parser, next_ref).ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

/// Decode a comment cell.
pub fn parse_comment(cell: &Cell) -> Option<String> {
    let mut parser = cell.parser();
    parse_comment_at(cell, &mut parser, 0)
}
