use std::fmt;

/// Result code returned by every entry point. Values match the C ABI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ZeResult {
    Success = 0,
    NotReady = 1,
    ErrorDeviceLost = 0x7000_0001,
    ErrorOutOfHostMemory = 0x7000_0002,
    ErrorOutOfDeviceMemory = 0x7000_0003,
    ErrorModuleBuildFailure = 0x7000_0004,
    ErrorUninitialized = 0x7800_0001,
    ErrorUnsupportedVersion = 0x7800_0002,
    ErrorUnsupportedFeature = 0x7800_0003,
    ErrorInvalidArgument = 0x7800_0004,
    ErrorInvalidNullHandle = 0x7800_0005,
    ErrorHandleObjectInUse = 0x7800_0006,
    ErrorInvalidNullPointer = 0x7800_0007,
    ErrorInvalidSize = 0x7800_0008,
    ErrorUnsupportedSize = 0x7800_0009,
    ErrorUnsupportedAlignment = 0x7800_000a,
    ErrorInvalidSynchronizationObject = 0x7800_000b,
    ErrorInvalidEnumeration = 0x7800_000c,
    ErrorUnsupportedEnumeration = 0x7800_000d,
    ErrorUnknown = 0x7fff_ffff,
}

impl ZeResult {
    pub fn is_success(self) -> bool {
        self == ZeResult::Success
    }

    pub fn raw(self) -> i32 {
        self as i32
    }

    /// Codes this loader does not know about collapse to `ErrorUnknown`.
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => ZeResult::Success,
            1 => ZeResult::NotReady,
            0x7000_0001 => ZeResult::ErrorDeviceLost,
            0x7000_0002 => ZeResult::ErrorOutOfHostMemory,
            0x7000_0003 => ZeResult::ErrorOutOfDeviceMemory,
            0x7000_0004 => ZeResult::ErrorModuleBuildFailure,
            0x7800_0001 => ZeResult::ErrorUninitialized,
            0x7800_0002 => ZeResult::ErrorUnsupportedVersion,
            0x7800_0003 => ZeResult::ErrorUnsupportedFeature,
            0x7800_0004 => ZeResult::ErrorInvalidArgument,
            0x7800_0005 => ZeResult::ErrorInvalidNullHandle,
            0x7800_0006 => ZeResult::ErrorHandleObjectInUse,
            0x7800_0007 => ZeResult::ErrorInvalidNullPointer,
            0x7800_0008 => ZeResult::ErrorInvalidSize,
            0x7800_0009 => ZeResult::ErrorUnsupportedSize,
            0x7800_000a => ZeResult::ErrorUnsupportedAlignment,
            0x7800_000b => ZeResult::ErrorInvalidSynchronizationObject,
            0x7800_000c => ZeResult::ErrorInvalidEnumeration,
            0x7800_000d => ZeResult::ErrorUnsupportedEnumeration,
            _ => ZeResult::ErrorUnknown,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ZeResult::Success => "ZE_RESULT_SUCCESS",
            ZeResult::NotReady => "ZE_RESULT_NOT_READY",
            ZeResult::ErrorDeviceLost => "ZE_RESULT_ERROR_DEVICE_LOST",
            ZeResult::ErrorOutOfHostMemory => "ZE_RESULT_ERROR_OUT_OF_HOST_MEMORY",
            ZeResult::ErrorOutOfDeviceMemory => "ZE_RESULT_ERROR_OUT_OF_DEVICE_MEMORY",
            ZeResult::ErrorModuleBuildFailure => "ZE_RESULT_ERROR_MODULE_BUILD_FAILURE",
            ZeResult::ErrorUninitialized => "ZE_RESULT_ERROR_UNINITIALIZED",
            ZeResult::ErrorUnsupportedVersion => "ZE_RESULT_ERROR_UNSUPPORTED_VERSION",
            ZeResult::ErrorUnsupportedFeature => "ZE_RESULT_ERROR_UNSUPPORTED_FEATURE",
            ZeResult::ErrorInvalidArgument => "ZE_RESULT_ERROR_INVALID_ARGUMENT",
            ZeResult::ErrorInvalidNullHandle => "ZE_RESULT_ERROR_INVALID_NULL_HANDLE",
            ZeResult::ErrorHandleObjectInUse => "ZE_RESULT_ERROR_HANDLE_OBJECT_IN_USE",
            ZeResult::ErrorInvalidNullPointer => "ZE_RESULT_ERROR_INVALID_NULL_POINTER",
            ZeResult::ErrorInvalidSize => "ZE_RESULT_ERROR_INVALID_SIZE",
            ZeResult::ErrorUnsupportedSize => "ZE_RESULT_ERROR_UNSUPPORTED_SIZE",
            ZeResult::ErrorUnsupportedAlignment => "ZE_RESULT_ERROR_UNSUPPORTED_ALIGNMENT",
            ZeResult::ErrorInvalidSynchronizationObject => {
                "ZE_RESULT_ERROR_INVALID_SYNCHRONIZATION_OBJECT"
            }
            ZeResult::ErrorInvalidEnumeration => "ZE_RESULT_ERROR_INVALID_ENUMERATION",
            ZeResult::ErrorUnsupportedEnumeration => "ZE_RESULT_ERROR_UNSUPPORTED_ENUMERATION",
            ZeResult::ErrorUnknown => "ZE_RESULT_ERROR_UNKNOWN",
        }
    }
}

impl fmt::Display for ZeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
