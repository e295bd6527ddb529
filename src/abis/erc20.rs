use alloy::sol;

sol! {
    /// Metadata subset of ERC-20; `name` and `symbol` are optional in the standard.
    #[sol(rpc)]
    interface IERC20Metadata {
        function name() external view returns (string);
        function symbol() external view returns (string);
        function decimals() external view returns (uint8);
    }
}
