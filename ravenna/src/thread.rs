use std::ffi::CString;
use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, Ordering};

pub fn set_name(name: &str) {
    let cstr = CString::new(name).expect("thread name must not contain nul bytes");

    unsafe {
        libc::pthread_setname_np(libc::pthread_self(), cstr.as_ptr());
    }
}

pub fn set_realtime_priority() {
    let rc = unsafe {
        libc::sched_setscheduler(0, libc::SCHED_FIFO, &libc::sched_param { sched_priority: 80 })
    };

    if rc < 0 {
        static WARNED: AtomicBool = AtomicBool::new(false);

        if !WARNED.swap(true, Ordering::Relaxed) {
            let err = std::io::Error::last_os_error();
            log::warn!("failed to set realtime thread priority: {err}");

            if err.kind() == ErrorKind::PermissionDenied {
                log::warn!("grant the capability with: setcap cap_sys_nice=ep <binary>");
            }
        }
    }
}
