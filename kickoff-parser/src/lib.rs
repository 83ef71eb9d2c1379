mod grammar {
    use pest_derive::Parser;

    #[derive(Parser)]
    #[grammar = "launchfile.pest"]
    pub struct LaunchfileParser;
}

mod parser;
mod template;

pub use parser::{parse_duration, parse_launchfile};
pub use template::LAUNCHFILE_TEMPLATE;
