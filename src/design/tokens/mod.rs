pub mod color;
pub mod extract;
pub mod normalize;

pub use color::{map_to_semantic_colors, ColorRoles};
pub use extract::{extract_tokens, RawTokens};
pub use normalize::{normalize_scale, normalize_tokens, DesignTokens, Scale};

use super::node::Node;

/// Two passes: harvest raw values, then collapse them onto the fixed scales.
pub fn design_tokens(root: &Node) -> DesignTokens {
    normalize_tokens(&extract_tokens(root))
}
