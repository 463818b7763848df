#![ allow (non_upper_case_globals, clippy::missing_safety_doc) ]

use std::ffi::c_void;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};

use once_cell::sync::Lazy;

use windows::core::{w, PWSTR};
use windows::Win32::Foundation::{BOOL, CloseHandle, HINSTANCE, HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::Console::{SetConsoleCtrlHandler, PHANDLER_ROUTINE};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::System::Threading::{
    GetCurrentThreadId, OpenProcess, PROCESS_NAME_WIN32, PROCESS_QUERY_LIMITED_INFORMATION, QueryFullProcessImageNameW
};
use windows::Win32::UI::Input::KeyboardAndMouse::{RegisterHotKey, UnregisterHotKey, HOT_KEY_MODIFIERS, MOD_NOREPEAT};
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, EnumWindows, GetForegroundWindow, GetMessageW,
    GetWindowTextW, GetWindowThreadProcessId, IsIconic, IsWindow, IsWindowVisible, KillTimer, PostQuitMessage,
    PostThreadMessageW, RegisterClassW, SetForegroundWindow, SetTimer, ShowWindow, TranslateMessage,
    MSG, SW_RESTORE, WM_QUIT, WNDCLASSW, WNDPROC, WS_EX_TOOLWINDOW, WS_OVERLAPPED,
};

use crate::registry::{Hwnd, Pid};



fn hwnd (h:Hwnd) -> HWND { HWND (h as *mut c_void) }



pub fn check_window_visible (h:Hwnd) -> bool { unsafe {
    IsWindowVisible (hwnd(h)) .as_bool()
} }

pub fn check_window_minimized (h:Hwnd) -> bool { unsafe {
    IsIconic (hwnd(h)) .as_bool()
} }

pub fn get_fgnd_window () -> Hwnd { unsafe {
    GetForegroundWindow().0 as Hwnd
} }

pub fn window_restore (h:Hwnd) { unsafe {
    let _ = ShowWindow (hwnd(h), SW_RESTORE);
} }

/// Asks for foreground focus .. the os can refuse (foreground-lock rules, or a stale handle)
pub fn window_set_foreground (h:Hwnd) -> bool { unsafe {
    SetForegroundWindow (hwnd(h)) .as_bool()
} }



pub fn get_window_text (h:Hwnd) -> String { unsafe {
    const MAX_LEN : usize = 512;
    let mut lpstr = [0u16; MAX_LEN];
    let copied_len = GetWindowTextW (hwnd(h), &mut lpstr);
    String::from_utf16_lossy (&lpstr[..(copied_len.max(0) as usize)])
} }

pub fn get_window_pid (h:Hwnd) -> Pid { unsafe {
    let mut pid : u32 = 0;
    let _ = GetWindowThreadProcessId (hwnd(h), Some(&mut pid));
    pid
} }

/// Full image path of a process, None when the process cant be opened (exited, or protected)
pub fn get_pid_exe_path (pid:Pid) -> Option<String> { unsafe {
    const MAX_LEN : usize = 1024;
    let handle = OpenProcess (PROCESS_QUERY_LIMITED_INFORMATION, BOOL::from(false), pid) .ok()?;
    let mut buf = [0u16; MAX_LEN];
    let mut len = MAX_LEN as u32;
    let res = QueryFullProcessImageNameW (handle, PROCESS_NAME_WIN32, PWSTR::from_raw(buf.as_mut_ptr()), &mut len);
    let _ = CloseHandle (handle);
    res.ok()?;
    Some (String::from_utf16_lossy (&buf[..len as usize]))
} }

/// Process image name without directory or extension (e.g. `Dofus` for `C:\..\Dofus.exe`)
pub fn get_pid_exe_name (pid:Pid) -> Option<String> {
    let path = get_pid_exe_path (pid)?;
    Path::new (&path) .file_stem() .map (|s| s.to_string_lossy().to_string())
}



// we'll use a static rwlocked vec to store top-level windows from callbacks, and a mutex to ensure only one enum call is active
static top_windows_lock : Lazy <Arc <Mutex <()>>> = Lazy::new (|| Arc::new ( Mutex::new(())));
static top_windows : Lazy <Arc <RwLock <Vec <Hwnd>>>> = Lazy::new (|| Arc::new ( RwLock::new (vec!()) ) );

/// All top-level windows, in z-order (topmost first)
pub fn get_top_level_windows () -> Vec<Hwnd> { unsafe {
    let lock = top_windows_lock.lock().unwrap();
    *top_windows.write().unwrap() = vec!();
    let _ = EnumWindows ( Some(enum_windows_cb), LPARAM::default() );
    let tws = top_windows.read().unwrap().clone();
    drop(lock);
    tws
} }

pub unsafe extern "system" fn enum_windows_cb (hwnd:HWND, _:LPARAM) -> BOOL {
    top_windows.write().unwrap().push (hwnd.0 as Hwnd);
    BOOL (true as i32)
}



/// Registers a global hotkey on our owner window .. auto-repeat is suppressed so holding the combo doesnt spin through windows
pub fn register_hotkey (owner:Hwnd, id:i32, modifiers:u32, vk:u32) -> bool { unsafe {
    RegisterHotKey (hwnd(owner), id, HOT_KEY_MODIFIERS(modifiers) | MOD_NOREPEAT, vk) .is_ok()
} }

pub fn unregister_hotkey (owner:Hwnd, id:i32) -> bool { unsafe {
    UnregisterHotKey (hwnd(owner), id) .is_ok()
} }



pub fn def_window_proc (hwnd:HWND, msg:u32, wparam:WPARAM, lparam:LPARAM) -> LRESULT { unsafe {
    DefWindowProcW (hwnd, msg, wparam, lparam)
} }

/// Creates the hidden top-level window our hotkeys are bound to.
/// It is never shown, but unlike a message-only window it gets the session-end broadcasts and WM_CLOSE.
pub fn create_owner_window (wnd_proc:WNDPROC) -> windows::core::Result<Hwnd> { unsafe {
    let class_name = w!("TabhopOwnerWindow");
    let hinst : HINSTANCE = GetModuleHandleW(None)?.into();
    let wc = WNDCLASSW {
        lpfnWndProc   : wnd_proc,
        hInstance     : hinst,
        lpszClassName : class_name,
        ..Default::default()
    };
    // re-registering after a window re-creation just fails harmlessly, the class is still there
    RegisterClassW (&wc);
    let h = CreateWindowExW (
        WS_EX_TOOLWINDOW, class_name, w!("tabhop"), WS_OVERLAPPED,
        0, 0, 0, 0, HWND::default(), None, hinst, None,
    )?;
    Ok (h.0 as Hwnd)
} }

pub fn check_window_exists (h:Hwnd) -> bool { unsafe {
    IsWindow (hwnd(h)) .as_bool()
} }

pub fn destroy_window (h:Hwnd) { unsafe {
    let _ = DestroyWindow (hwnd(h));
} }



/// Sets up a thread timer (no owner window) .. its WM_TIMER messages carry the returned id in wparam
pub fn set_thread_timer (period_ms:u32) -> usize { unsafe {
    SetTimer (HWND::default(), 0, period_ms, None)
} }

pub fn kill_thread_timer (id:usize) { unsafe {
    let _ = KillTimer (HWND::default(), id);
} }

pub fn get_cur_thread_id () -> u32 { unsafe {
    GetCurrentThreadId()
} }

/// Blocks for the next message of this thread, None once WM_QUIT arrives (or the queue errors out)
pub fn get_next_message () -> Option<MSG> { unsafe {
    let mut msg = MSG::default();
    if GetMessageW (&mut msg, HWND::default(), 0, 0) .0 > 0 { Some(msg) } else { None }
} }

pub fn dispatch_message (msg:&MSG) { unsafe {
    let _ = TranslateMessage (msg);
    DispatchMessageW (msg);
} }

/// Posts WM_QUIT to the calling thread's own queue
pub fn post_quit_message () { unsafe {
    PostQuitMessage (0);
} }

/// Makes the `get_next_message` loop on the given thread return
pub fn post_quit_to_thread (thread_id:u32) -> bool { unsafe {
    PostThreadMessageW (thread_id, WM_QUIT, WPARAM::default(), LPARAM::default()) .is_ok()
} }

pub fn set_console_ctrl_handler (handler:PHANDLER_ROUTINE) -> bool { unsafe {
    SetConsoleCtrlHandler (handler, BOOL::from(true)) .is_ok()
} }
