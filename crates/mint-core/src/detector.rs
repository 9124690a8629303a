//! Mint function detection
//!
//! Ranks the `mint`-like functions of a contract interface by a fixed set of
//! scoring rules, then dry-runs each candidate in rank order until one would
//! succeed for the probing account. A passing dry-run is a strong hint, not a
//! guarantee: state may change before the real transaction lands.

use ethers::abi::{Function, ParamType, Token};
use ethers::types::{Address, U256};
use std::cmp::Reverse;
use std::sync::Arc;
use tracing::{debug, info};

use crate::chain_client::ChainClient;
use crate::error::{ChainError, MintError};
use crate::metadata::ContractMetadataResolver;
use crate::revert::{decode_revert, truncate_reason};
use crate::types::MintCall;

/// One additive scoring rule.
pub struct ScoringRule {
    pub description: &'static str,
    pub points: i32,
    pub applies: fn(&Function) -> bool,
}

fn is_exact_mint(function: &Function) -> bool {
    function.name.eq_ignore_ascii_case("mint")
}

fn mentions_public(function: &Function) -> bool {
    function.name.to_ascii_lowercase().contains("public")
}

fn has_few_params(function: &Function) -> bool {
    function.inputs.len() <= 2
}

pub const SCORING_RULES: &[ScoringRule] = &[
    ScoringRule { description: "name is exactly mint", points: 5, applies: is_exact_mint },
    ScoringRule { description: "name mentions public", points: 3, applies: mentions_public },
    ScoringRule { description: "at most two parameters", points: 1, applies: has_few_params },
];

pub fn score(function: &Function) -> i32 {
    SCORING_RULES
        .iter()
        .filter(|rule| (rule.applies)(function))
        .map(|rule| rule.points)
        .sum()
}

/// A ranked mint-like function.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateFunction {
    pub function: Function,
    pub score: i32,
}

impl CandidateFunction {
    /// Canonical `name(type,...)` form.
    pub fn signature(&self) -> String {
        canonical_signature(&self.function)
    }

    /// Build a call to this function for `quantity` tokens at `value`.
    pub fn build_call(&self, contract: Address, quantity: U256, value: U256) -> Result<MintCall, MintError> {
        encode_mint_call(&self.function, contract, quantity, value)
    }
}

pub fn canonical_signature(function: &Function) -> String {
    let params: Vec<String> = function.inputs.iter().map(|p| p.kind.to_string()).collect();
    format!("{}({})", function.name, params.join(","))
}

/// Quantity is passed as the sole argument when the first input is an unsigned integer.
pub fn mint_arguments(function: &Function, quantity: U256) -> Vec<Token> {
    match function.inputs.first().map(|p| &p.kind) {
        Some(ParamType::Uint(_)) => vec![Token::Uint(quantity)],
        _ => Vec::new(),
    }
}

pub fn encode_mint_call(
    function: &Function,
    contract: Address,
    quantity: U256,
    value: U256,
) -> Result<MintCall, MintError> {
    let data = function
        .encode_input(&mint_arguments(function, quantity))
        .map_err(|e| MintError::Config(format!("cannot encode {}: {}", canonical_signature(function), e)))?;
    Ok(MintCall::new(contract, data, value))
}

/// Mint-like functions, best first. Ties keep interface order.
pub fn rank_candidates(functions: &[Function]) -> Vec<CandidateFunction> {
    let mut candidates: Vec<CandidateFunction> = functions
        .iter()
        .filter(|f| f.name.to_ascii_lowercase().contains("mint"))
        .map(|f| CandidateFunction { function: f.clone(), score: score(f) })
        .collect();
    candidates.sort_by_key(|c| Reverse(c.score));
    candidates
}

pub struct MintFunctionDetector {
    client: Arc<dyn ChainClient>,
    resolver: Arc<dyn ContractMetadataResolver>,
}

impl MintFunctionDetector {
    pub fn new(client: Arc<dyn ChainClient>, resolver: Arc<dyn ContractMetadataResolver>) -> Self {
        Self { client, resolver }
    }

    /// First ranked candidate whose trial call succeeds for `probe`.
    pub async fn detect(
        &self,
        contract: Address,
        probe: Address,
        quantity: U256,
        value: U256,
    ) -> Result<CandidateFunction, MintError> {
        let functions = self.resolver.fetch_interface(contract).await?;
        let candidates = rank_candidates(&functions);
        if candidates.is_empty() {
            return Err(MintError::NoCandidateFunction("no mint-like function in interface".into()));
        }

        debug!(
            contract = ?contract,
            candidates = ?candidates.iter().map(|c| (c.signature(), c.score)).collect::<Vec<_>>(),
            "Ranked mint candidates"
        );

        let mut last_reason = String::new();
        for candidate in candidates {
            let call = match candidate.build_call(contract, quantity, value) {
                Ok(call) => call,
                Err(e) => {
                    last_reason = e.to_string();
                    continue;
                }
            };

            match self.client.simulate(probe, &call).await {
                Ok(_) => {
                    info!(
                        contract = ?contract,
                        function = %candidate.signature(),
                        score = candidate.score,
                        "Detected mint function"
                    );
                    return Ok(candidate);
                }
                Err(ChainError::Revert { message, data }) => {
                    last_reason = decode_revert(call.error_set, data.as_deref(), &message).to_short_string();
                }
                Err(ChainError::Transport(message)) => {
                    last_reason = truncate_reason(&message);
                }
            }
            debug!(function = %candidate.signature(), reason = %last_reason, "Candidate rejected");
        }

        Err(MintError::NoCandidateFunction(last_reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{address, function, MockChainClient, StaticMetadataResolver};

    const INTERFACE: &[&str] = &[
        "function ownerMint(address to, uint256 qty, bytes32 salt)",
        "function publicMint(uint256 qty) payable",
        "function totalSupply() view returns (uint256)",
        "function mint(uint256 qty) payable",
    ];

    fn selector_of(signature: &str) -> [u8; 4] {
        function(signature).short_signature()
    }

    #[test]
    fn test_scores_and_ranking() {
        let functions: Vec<Function> = INTERFACE.iter().map(|s| function(s)).collect();
        let ranked = rank_candidates(&functions);

        let order: Vec<(String, i32)> = ranked.iter().map(|c| (c.signature(), c.score)).collect();
        assert_eq!(
            order,
            vec![
                ("mint(uint256)".to_string(), 6),
                ("publicMint(uint256)".to_string(), 4),
                ("ownerMint(address,uint256,bytes32)".to_string(), 0),
            ]
        );
    }

    #[test]
    fn test_ties_keep_interface_order() {
        let functions = vec![function("function mintTo(address to)"), function("function freeMint()")];
        let ranked = rank_candidates(&functions);
        assert_eq!(ranked[0].function.name, "mintTo");
        assert_eq!(ranked[1].function.name, "freeMint");
    }

    #[test]
    fn test_quantity_argument_only_for_uint_first_param() {
        let quantity = U256::from(3u64);
        assert_eq!(mint_arguments(&function("function mint(uint256 qty)"), quantity), vec![Token::Uint(quantity)]);
        assert!(mint_arguments(&function("function mintTo(address to)"), quantity).is_empty());
        assert!(mint_arguments(&function("function mint()"), quantity).is_empty());
    }

    #[tokio::test]
    async fn test_detect_skips_failing_candidates() {
        let client = Arc::new(
            MockChainClient::new().with_revert(selector_of("function mint(uint256)"), "execution reverted: paused"),
        );
        let resolver = Arc::new(StaticMetadataResolver::new(INTERFACE));
        let detector = MintFunctionDetector::new(client.clone(), resolver);

        let detected = detector.detect(address(0xc0), address(1), U256::one(), U256::zero()).await.unwrap();
        assert_eq!(detected.signature(), "publicMint(uint256)");
        assert_eq!(client.simulation_count(), 2);
        assert_eq!(client.broadcast_count(), 0);
    }

    #[tokio::test]
    async fn test_detect_reports_last_failure() {
        let client = Arc::new(
            MockChainClient::new()
                .with_revert(selector_of("function mint(uint256)"), "execution reverted: paused")
                .with_revert(selector_of("function publicMint(uint256)"), "execution reverted: not started")
                .with_revert(selector_of("function ownerMint(address,uint256,bytes32)"), "execution reverted: only owner"),
        );
        let resolver = Arc::new(StaticMetadataResolver::new(INTERFACE));
        let detector = MintFunctionDetector::new(client, resolver);

        let err = detector.detect(address(0xc0), address(1), U256::one(), U256::zero()).await.unwrap_err();
        assert_eq!(err.to_string(), "no candidate function: only owner");
    }

    #[tokio::test]
    async fn test_detect_without_mint_functions() {
        let client = Arc::new(MockChainClient::new());
        let resolver = Arc::new(StaticMetadataResolver::new(&["function totalSupply() view returns (uint256)"]));
        let detector = MintFunctionDetector::new(client.clone(), resolver);

        let err = detector.detect(address(0xc0), address(1), U256::one(), U256::zero()).await.unwrap_err();
        assert!(err.to_string().contains("no mint-like function in interface"));
        assert_eq!(client.simulation_count(), 0);
    }

    #[tokio::test]
    async fn test_detect_propagates_missing_metadata() {
        let detector = MintFunctionDetector::new(
            Arc::new(MockChainClient::new()),
            Arc::new(StaticMetadataResolver::unavailable()),
        );
        let err = detector.detect(address(0xc0), address(1), U256::one(), U256::zero()).await.unwrap_err();
        assert!(matches!(err, MintError::MetadataUnavailable(_)));
    }

    #[tokio::test]
    async fn test_detection_is_idempotent() {
        let client = Arc::new(
            MockChainClient::new().with_revert(selector_of("function mint(uint256)"), "execution reverted: paused"),
        );
        let resolver = Arc::new(StaticMetadataResolver::new(INTERFACE));
        let detector = MintFunctionDetector::new(client, resolver);

        let first = detector.detect(address(0xc0), address(1), U256::one(), U256::zero()).await.unwrap();
        let second = detector.detect(address(0xc0), address(1), U256::one(), U256::zero()).await.unwrap();
        assert_eq!(first, second);
    }
}
