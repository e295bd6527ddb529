use alloy::sol;

sol! {
    /// One sub-call of `aggregate3`; failures are tolerated when `allowFailure` is set.
    struct Call3 {
        address target;
        bool allowFailure;
        bytes callData;
    }

    struct Call3Result {
        bool success;
        bytes returnData;
    }

    #[sol(rpc)]
    interface IMulticall3 {
        function aggregate3(Call3[] calldata calls) external payable returns (Call3Result[] memory returnData);
    }
}
