//! §4.5: an optional, single bounded handoff of the code-section pass to a background
//! thread for modules above a configurable size. There is exactly one spawn-and-join per
//! parse; the caller blocks on completion, so no ordering issues arise between the decoder
//! and whatever consumes its output (§5).

use tracing::debug;

use crate::error::{DecodeError, DecodeResult};
use crate::limits::ParserConfig;

const ONE_MB: usize = 1024 * 1024;
const TEN_MB: usize = 10 * ONE_MB;

/// Runs the code-section pass either inline or on a single spawned worker thread,
/// depending on `config.async_parsing_binary_size` and `module_size`.
pub struct AsyncDriver;

impl AsyncDriver {
	pub fn run_code_section<F, T>(config: ParserConfig, module_size: usize, f: F) -> DecodeResult<T>
	where
		F: FnOnce() -> DecodeResult<T> + Send,
		T: Send,
	{
		if config.async_parsing_binary_size == 0 || (module_size as u64) <= config.async_parsing_binary_size as u64 {
			return f();
		}

		let stack_size = if config.async_parsing_stack_size != 0 {
			config.async_parsing_stack_size as usize * 1024
		} else {
			default_stack_size(module_size)
		};
		debug!(module_size, stack_size, "spawning code-section worker thread");

		std::thread::scope(|scope| {
			let handle = std::thread::Builder::new()
				.stack_size(stack_size)
				.spawn_scoped(scope, f)
				.expect("failed to spawn code-section worker thread");
			match handle.join() {
				Ok(result) => result.map_err(|_| DecodeError::UnspecifiedInvalid("Asynchronous parsing failed.".into())),
				Err(_) => Err(DecodeError::UnspecifiedInvalid("Asynchronous parsing interrupted.".into())),
			}
		})
	}
}

fn default_stack_size(module_size: usize) -> usize {
	ONE_MB.max((2 * module_size).min(TEN_MB))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn runs_synchronously_when_threshold_is_zero() {
		let config = ParserConfig { async_parsing_binary_size: 0, ..ParserConfig::default() };
		let result = AsyncDriver::run_code_section(config, 1_000_000, || Ok(42));
		assert_eq!(result.unwrap(), 42);
	}

	#[test]
	fn runs_synchronously_below_threshold() {
		let config = ParserConfig { async_parsing_binary_size: 1_000, ..ParserConfig::default() };
		let result = AsyncDriver::run_code_section(config, 10, || Ok(7));
		assert_eq!(result.unwrap(), 7);
	}

	#[test]
	fn spawns_above_threshold_and_propagates_the_result() {
		let config = ParserConfig { async_parsing_binary_size: 10, async_parsing_stack_size: 64, ..ParserConfig::default() };
		let local = 5;
		let result = AsyncDriver::run_code_section(config, 1_000, move || Ok(local * 2));
		assert_eq!(result.unwrap(), 10);
	}

	#[test]
	fn normalizes_a_failure_from_the_worker_thread() {
		let config = ParserConfig { async_parsing_binary_size: 10, ..ParserConfig::default() };
		let result: DecodeResult<()> = AsyncDriver::run_code_section(config, 1_000, || Err(DecodeError::UnexpectedEnd { context: "x" }));
		assert_eq!(result, Err(DecodeError::UnspecifiedInvalid("Asynchronous parsing failed.".into())));
	}
}
