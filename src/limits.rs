/// Hard ceilings enforced while decoding a module. Every breach raises
/// [`crate::error::DecodeError::ResourceLimitExceeded`] naming the ceiling that was hit.
///
/// The defaults are generous MVP-era numbers, not tuned for any particular embedder; callers
/// with tighter sandboxing requirements are expected to override individual fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleLimits {
	pub max_types: u32,
	pub max_imports: u32,
	pub max_functions: u32,
	pub max_globals: u32,
	pub max_exports: u32,
	pub max_element_segments: u32,
	pub max_data_segments: u32,
	pub max_locals_per_function: u32,
	pub max_function_body_size: u32,
	pub max_module_size: u32,
	pub max_memory_pages: u32,
}

impl Default for ModuleLimits {
	fn default() -> Self {
		ModuleLimits {
			max_types: 1_000_000,
			max_imports: 100_000,
			max_functions: 1_000_000,
			max_globals: 1_000_000,
			max_exports: 100_000,
			max_element_segments: 100_000,
			max_data_segments: 100_000,
			max_locals_per_function: 50_000,
			max_function_body_size: 128 * 1024 * 1024,
			max_module_size: 1024 * 1024 * 1024,
			max_memory_pages: 65536,
		}
	}
}

/// Knobs consumed only by [`crate::async_driver::AsyncDriver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserConfig {
	/// Byte threshold above which the code section pass is spawned on a background thread.
	/// `0` means always synchronous.
	pub async_parsing_binary_size: u32,
	/// Requested stack size in KB for the background thread. `0` means compute a default.
	pub async_parsing_stack_size: u32,
	pub limits: ModuleLimits,
}

impl Default for ParserConfig {
	fn default() -> Self {
		ParserConfig {
			async_parsing_binary_size: 0,
			async_parsing_stack_size: 0,
			limits: ModuleLimits::default(),
		}
	}
}

/// Implemented by anything that can hand a [`ParserConfig`] to the decoder; kept as a trait
/// (rather than just passing `ParserConfig` by value everywhere) so an embedder can source
/// limits from e.g. a per-tenant policy object without this crate knowing about it.
pub trait ConfigProvider {
	fn parser_config(&self) -> ParserConfig;
}

impl ConfigProvider for ParserConfig {
	fn parser_config(&self) -> ParserConfig {
		*self
	}
}
