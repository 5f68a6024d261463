pub mod plan;
pub mod make_migrations;
pub mod show;
pub mod setup;

pub use plan::{compute_operations, AppOperations, ChangeKind, FunctionChange, MigrationPlan};
pub use make_migrations::{
    execute_make_migrations, generate_migrations, MakeMigrationsOptions, MakeMigrationsResult,
};
pub use show::{execute_show_migrations, ShowResult};
pub use setup::execute_setup;

#[cfg(feature = "cli")]
pub use plan::print_plan_summary;
#[cfg(feature = "cli")]
pub use make_migrations::print_make_migrations_summary;
#[cfg(feature = "cli")]
pub use show::print_show_summary;
