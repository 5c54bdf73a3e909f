use crate::error::{Error, Result};
use crate::token::TokenProtocol;

/// Largest value the covenant handles as a script number.
pub const MAX_SCRIPT_INT: u64 = 0x7fff_ffff;

/// Parameters of a partial offer.
///
/// Token and sat amounts are truncated: the low `num_token_trunc_bytes`
/// (resp. `num_sats_trunc_bytes`) bytes are dropped so the covenant can do
/// its arithmetic within 31-bit script numbers. Accepted amounts are in
/// "scaled" units (`trunc tokens * token_scale_factor`) on-chain, so that a
/// price of `scaled_trunc_tokens_per_trunc_sat` can be finer than one
/// truncated token per truncated sat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgoraPartial {
    /// Offered tokens with the low `num_token_trunc_bytes` bytes removed.
    pub trunc_tokens: u64,
    pub num_token_trunc_bytes: u8,
    pub token_scale_factor: u64,
    pub scaled_trunc_tokens_per_trunc_sat: u64,
    pub num_sats_trunc_bytes: u8,
    /// Receives the sats and can cancel the offer.
    pub maker_pk: [u8; 33],
    pub min_accepted_scaled_trunc_tokens: u64,
    pub token_id: String,
    /// Protocol-specific token type number.
    pub token_type: u8,
    pub token_protocol: TokenProtocol,
    /// Length of the covenant body, which the script embeds in itself.
    /// Kept consistent by [`AgoraPartial::update_script_len`].
    pub script_len: usize,
    /// Value of the remainder output of a fractional accept.
    pub dust_amount: u64,
}

impl AgoraPartial {
    /// Tag identifying this covenant in plugin data and ad pushdata.
    pub const COVENANT_VARIANT: &'static str = "PARTIAL";

    /// Check the parameters fit the covenant's script-number arithmetic.
    pub fn validate(&self) -> Result<()> {
        let bad = |msg: String| Err(Error::InvalidOfferParams(msg));
        let max_token_trunc_bytes = match self.token_protocol {
            TokenProtocol::Slp => 4,
            TokenProtocol::Alp => 2,
        };
        if self.num_token_trunc_bytes > max_token_trunc_bytes {
            return bad(format!(
                "num_token_trunc_bytes {} exceeds {max_token_trunc_bytes} for {}",
                self.num_token_trunc_bytes, self.token_protocol
            ));
        }
        if self.num_sats_trunc_bytes > 4 {
            return bad(format!(
                "num_sats_trunc_bytes {} exceeds 4",
                self.num_sats_trunc_bytes
            ));
        }
        if self.token_scale_factor == 0 || self.scaled_trunc_tokens_per_trunc_sat == 0 {
            return bad("token_scale_factor and price must be positive".into());
        }
        let scaled = u128::from(self.trunc_tokens) * u128::from(self.token_scale_factor);
        let max_numerator = scaled + u128::from(self.scaled_trunc_tokens_per_trunc_sat) - 1;
        if max_numerator > u128::from(MAX_SCRIPT_INT) {
            return bad(format!(
                "scaled offer {scaled} plus price exceeds script integer range"
            ));
        }
        if self.min_accepted_scaled_trunc_tokens > MAX_SCRIPT_INT {
            return bad(format!(
                "min_accepted_scaled_trunc_tokens {} exceeds script integer range",
                self.min_accepted_scaled_trunc_tokens
            ));
        }
        Ok(())
    }

    /// `2^(8 * num_token_trunc_bytes)`; accepted tokens must be a multiple.
    pub fn trunc_factor(&self) -> Result<u64> {
        1u64.checked_shl(self.token_shift()).ok_or_else(|| {
            Error::InvalidOfferParams(format!(
                "num_token_trunc_bytes {} is too wide",
                self.num_token_trunc_bytes
            ))
        })
    }

    fn token_shift(&self) -> u32 {
        8 * u32::from(self.num_token_trunc_bytes)
    }

    fn sats_shift(&self) -> u32 {
        8 * u32::from(self.num_sats_trunc_bytes)
    }

    /// Tokens currently offered, in base units.
    pub fn offered_tokens(&self) -> Result<u64> {
        self.trunc_tokens
            .checked_mul(self.trunc_factor()?)
            .ok_or_else(|| overflow("offered tokens"))
    }

    /// Offered amount as the covenant stores it.
    pub fn scaled_trunc_tokens(&self) -> Result<u64> {
        self.trunc_tokens
            .checked_mul(self.token_scale_factor)
            .ok_or_else(|| overflow("scaled offered tokens"))
    }

    /// Smallest amount of tokens that can be accepted, in base units.
    pub fn min_accepted_tokens(&self) -> Result<u64> {
        self.min_accepted_scaled_trunc_tokens
            .checked_div(self.token_scale_factor)
            .and_then(|min_trunc| min_trunc.checked_mul(self.trunc_factor().ok()?))
            .ok_or_else(|| overflow("minimum accepted tokens"))
    }

    /// Round `accepted_tokens` down to an amount the covenant can accept.
    pub fn prepare_accepted_tokens(&self, accepted_tokens: u64) -> Result<u64> {
        Ok(accepted_tokens - accepted_tokens % self.trunc_factor()?)
    }

    /// Sats the maker asks for `accepted_tokens`.
    ///
    /// `ceil(accepted_scaled / price)` in truncated sats, then shifted back
    /// to whole sats. This is exactly what the covenant computes.
    pub fn asked_sats(&self, accepted_tokens: u64) -> Result<u64> {
        self.validate()?;
        let offered_tokens = self.offered_tokens()?;
        if accepted_tokens > offered_tokens {
            return Err(Error::AcceptAmountTooLarge {
                accepted_tokens,
                offered_tokens,
            });
        }
        let accepted_scaled =
            u128::from(accepted_tokens >> self.token_shift()) * u128::from(self.token_scale_factor);
        let price = u128::from(self.scaled_trunc_tokens_per_trunc_sat);
        let trunc_sats = accepted_scaled.div_ceil(price);
        u64::try_from(trunc_sats << self.sats_shift()).map_err(|_| overflow("asked sats"))
    }

    /// The same offer holding `trunc_tokens` instead, e.g. the remainder
    /// left after a fractional accept.
    pub fn with_trunc_tokens(&self, trunc_tokens: u64) -> Self {
        Self {
            trunc_tokens,
            ..self.clone()
        }
    }
}

fn overflow(what: &str) -> Error {
    Error::InvalidOfferParams(format!("{what} overflows u64"))
}
