use std::ffi::c_void;
use std::fmt;

/// An opaque, driver-minted identity. Never dereferenced by the loader,
/// only compared and hashed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(usize);

impl Handle {
    pub const NULL: Handle = Handle(0);

    pub const fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    pub fn from_ptr(ptr: *const c_void) -> Self {
        Self(ptr as usize)
    }

    pub const fn raw(self) -> usize {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Kinds of driver objects whose lifetime the loader can follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HandleCategory {
    Context,
    CommandQueue,
    Module,
    Kernel,
    EventPool,
    CommandList,
    Event,
    Fence,
    Image,
    Sampler,
    MemoryAllocation,
}

impl HandleCategory {
    pub const COUNT: usize = 11;

    /// Telemetry column order.
    pub const ALL: [HandleCategory; Self::COUNT] = [
        HandleCategory::Context,
        HandleCategory::CommandQueue,
        HandleCategory::Module,
        HandleCategory::Kernel,
        HandleCategory::EventPool,
        HandleCategory::CommandList,
        HandleCategory::Event,
        HandleCategory::Fence,
        HandleCategory::Image,
        HandleCategory::Sampler,
        HandleCategory::MemoryAllocation,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    /// Plural label, used for telemetry headers and summaries.
    pub const fn label(self) -> &'static str {
        match self {
            HandleCategory::Context => "Contexts",
            HandleCategory::CommandQueue => "CommandQueues",
            HandleCategory::Module => "Modules",
            HandleCategory::Kernel => "Kernels",
            HandleCategory::EventPool => "EventPools",
            HandleCategory::CommandList => "CommandLists",
            HandleCategory::Event => "Events",
            HandleCategory::Fence => "Fences",
            HandleCategory::Image => "Images",
            HandleCategory::Sampler => "Samplers",
            HandleCategory::MemoryAllocation => "MemoryAllocations",
        }
    }
}

impl fmt::Display for HandleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
