mod index;
mod types;

use std::ffi::CStr;

pub use index::*;
pub use types::*;

use crate::error::{Error, Result};

/// 检查 faiss C API 的返回值，非零时读取最后一次错误信息
pub(crate) fn faiss_try(code: std::os::raw::c_int) -> Result<()> {
    if code != 0 {
        let message = unsafe {
            let err = faiss_sys::faiss_get_last_error();
            if err.is_null() {
                String::from("unknown error")
            } else {
                CStr::from_ptr(err).to_string_lossy().into_owned()
            }
        };
        return Err(Error::Faiss { code, message });
    }
    Ok(())
}
