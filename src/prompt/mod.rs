pub mod examples;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use rand::Rng;

use crate::error::TracksideError;
use crate::prompt::examples::ExampleSet;

/// Strategy names as typed by the operator, in the order they are offered.
pub const STRATEGY_NAMES: [&str; 5] = [
    "zero-shot",
    "one-shot",
    "few-shot",
    "chain of thought",
    "auto chain of thought",
];

/// Role, audience, and tone instructions. Every prompt starts with this.
pub const PREAMBLE: &str = "You are a professional copywriter tasked with writing a report about an athletics match, in which Scopias Atletiek participated. The report will be published on the Scopias Atletiek website. Your goal is to write a report that is informative and engaging for the readers. It should thus not simply be a sum up of the results of the match, but also be a pleasure to read. All results of Scopias Atletiek athletes should be included in the report.\n\n Your target audience is the members of Scopias Atletiek, as well as other athletics enthusiasts. The report should be written in a professional and engaging tone, and should be easy to read and understand. Output the report in a markdown format.\n\n";

/// The fixed outline used by the manual chain-of-thought strategy.
pub const CHAIN_OF_THOUGHT_STEPS: &str = "1. Carefully read the data and extract the results of all athletes from Scopias Atletiek.\n2. Write an introduction to the report in which you include what the name of the match was and where it took place.\n3. Write a summary of the match, in which you include the results of Scopias Atletiek athletes.\n4. Write a conclusion in which you summarize the results of the match and give your opinion on the performance of the athletes.";

/// Meta-prompt asking the model to produce its own outline.
pub const OUTLINE_PROMPT: &str = "You are tasked with writing a report about the athletics match. You are given the results of the match and do not have access to additional data. Come up with a chain of thought to write the report. Include which steps should be taken to write the report and what information should be included. Output should be a numbered list of steps.";

/// Token cap for the generated outline.
pub const OUTLINE_MAX_TOKENS: u64 = 500;

/// Prompt-engineering mode. Exactly one is active per prompt build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptStrategy {
    ZeroShot,
    OneShot,
    FewShot,
    ChainOfThought,
    AutoChainOfThought,
}

impl FromStr for PromptStrategy {
    type Err = TracksideError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "zero-shot" => Ok(Self::ZeroShot),
            "one-shot" => Ok(Self::OneShot),
            "few-shot" => Ok(Self::FewShot),
            "chain of thought" => Ok(Self::ChainOfThought),
            "auto chain of thought" => Ok(Self::AutoChainOfThought),
            other => Err(TracksideError::InvalidStrategy {
                input: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for PromptStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ZeroShot => "zero-shot",
            Self::OneShot => "one-shot",
            Self::FewShot => "few-shot",
            Self::ChainOfThought => "chain of thought",
            Self::AutoChainOfThought => "auto chain of thought",
        };
        f.write_str(name)
    }
}

impl PromptStrategy {
    /// Number of example reports this strategy samples.
    pub fn example_count(&self) -> usize {
        match self {
            Self::OneShot => 1,
            Self::FewShot => 3,
            _ => 0,
        }
    }

    /// Whether the prompt carries a chain-of-thought block.
    pub fn uses_chain_of_thought(&self) -> bool {
        matches!(self, Self::ChainOfThought | Self::AutoChainOfThought)
    }
}

/// Assembles the final prompt from the selected strategy's blocks.
/// Holds only the example directory path; the directory itself is read
/// fresh per build.
pub struct PromptBuilder {
    examples_dir: PathBuf,
}

impl PromptBuilder {
    pub fn new(examples_dir: impl Into<PathBuf>) -> Self {
        Self {
            examples_dir: examples_dir.into(),
        }
    }

    /// Build the prompt for `strategy`.
    ///
    /// `outline` is only read for "auto chain of thought", where the
    /// caller supplies the generated outline; the builder itself never
    /// touches the network. The manual strategy uses the fixed steps.
    pub fn build<R: Rng + ?Sized>(
        &self,
        data: &str,
        strategy: PromptStrategy,
        outline: Option<&str>,
        rng: &mut R,
    ) -> Result<String, TracksideError> {
        let chain_of_thought = match strategy {
            PromptStrategy::ChainOfThought => Some(CHAIN_OF_THOUGHT_STEPS),
            PromptStrategy::AutoChainOfThought => outline,
            _ => None,
        };

        let examples = match strategy.example_count() {
            0 => Vec::new(),
            count => ExampleSet::load(&self.examples_dir)?.sample(count, rng)?,
        };

        Ok(assemble(data, chain_of_thought, &examples))
    }
}

/// Deterministic assembly of the final prompt text.
///
/// Block order is part of the output contract and must not change:
/// preamble, chain-of-thought, examples, data.
pub fn assemble(data: &str, chain_of_thought: Option<&str>, examples: &[String]) -> String {
    let mut prompt = String::from(PREAMBLE);

    if let Some(outline) = chain_of_thought {
        prompt.push_str("When writing the report follow this chain of thought:\n");
        prompt.push_str(outline);
        prompt.push_str("\n\n");
    }

    if !examples.is_empty() {
        prompt.push_str("To help you write the report, here are some examples of previous reports:\n");
        for (i, example) in examples.iter().enumerate() {
            prompt.push_str(&format!("Example {}:\n{example}\n\n", i + 1));
        }
    }

    prompt.push_str(&format!("Data:\n{data}\n"));
    prompt
}
