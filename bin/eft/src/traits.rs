//! Contains the [TestExecutor] trait, which describes the interface shared by the `eft`
//! subcommands.

use anyhow::Result;
use async_trait::async_trait;

/// The [TestExecutor] trait describes a subcommand that processes a set of named cases.
#[async_trait]
pub trait TestExecutor {
    /// The input of a single case.
    type Case: Send;
    /// The output of a single case.
    type Output: Send;

    /// Executes all selected cases.
    ///
    /// ## Returns
    /// - `Ok` - Every case was executed successfully.
    /// - `Err` - An error occurred while executing the cases.
    async fn exec(&self) -> Result<()>;

    /// Executes a given case.
    ///
    /// ## Takes
    /// - `name` - The name of the case.
    /// - `case` - The case to run.
    async fn exec_single(&self, name: String, case: Self::Case) -> Result<Self::Output>;

    /// Retrieve the cases to run based on the configuration, reading them from disk.
    ///
    /// ## Returns
    /// - `Ok(Vec<(String, Self::Case)>)` - A vector of case names and their inputs.
    /// - `Err` - An error occurred while loading the cases.
    async fn get_selected_cases(&self) -> Result<Vec<(String, Self::Case)>>;
}
