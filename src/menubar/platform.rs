//! macOS implementations of the OS services.
//!
//! Login items go through `SMAppService` (macOS 13+), notification
//! permission through `UNUserNotificationCenter`, and activation through
//! `NSApplication`. Classes are looked up at runtime so an older system
//! reports an error instead of crashing.

use crate::services::{LoginItemService, NotificationService, PermissionReply};
use anyhow::{anyhow, bail, Result};
use block2::RcBlock;
use objc2::runtime::{AnyClass, AnyObject, Bool};
use objc2::{class, msg_send, sel};
use std::ffi::{c_char, CStr};
use std::sync::Mutex;

#[link(name = "ServiceManagement", kind = "framework")]
extern "C" {}

#[link(name = "UserNotifications", kind = "framework")]
extern "C" {}

/// `UNAuthorizationOptionSound`
const AUTHORIZATION_OPTION_SOUND: usize = 1 << 1;
/// `UNAuthorizationOptionAlert`
const AUTHORIZATION_OPTION_ALERT: usize = 1 << 2;

/// Login item registration for the running app bundle.
pub struct MacLoginItems;

impl MacLoginItems {
    /// Call `registerAndReturnError:` or `unregisterAndReturnError:` on
    /// `SMAppService.mainAppService`.
    fn update(register: bool) -> Result<()> {
        let cls = AnyClass::get("SMAppService")
            .ok_or_else(|| anyhow!("SMAppService is unavailable (requires macOS 13)"))?;

        unsafe {
            let service: *mut AnyObject = msg_send![cls, mainAppService];
            if service.is_null() {
                bail!("SMAppService.mainAppService returned nil");
            }

            let mut error: *mut AnyObject = std::ptr::null_mut();
            let ok: Bool = if register {
                msg_send![service, registerAndReturnError: &mut error as *mut *mut AnyObject]
            } else {
                msg_send![service, unregisterAndReturnError: &mut error as *mut *mut AnyObject]
            };

            if ok.as_bool() {
                Ok(())
            } else {
                Err(anyhow!(describe_error(error)))
            }
        }
    }
}

impl LoginItemService for MacLoginItems {
    fn register(&self) -> Result<()> {
        Self::update(true)
    }

    fn unregister(&self) -> Result<()> {
        Self::update(false)
    }
}

/// Notification permission via the user notification center.
pub struct MacNotifications;

impl NotificationService for MacNotifications {
    fn request_authorization(&self, reply: PermissionReply) {
        let Some(cls) = AnyClass::get("UNUserNotificationCenter") else {
            tracing::warn!("UNUserNotificationCenter is unavailable");
            reply(false);
            return;
        };

        // The notification center throws outside an app bundle
        if !has_bundle_identifier() {
            tracing::warn!("Not running from an app bundle, notifications unavailable");
            reply(false);
            return;
        }

        unsafe {
            let center: *mut AnyObject = msg_send![cls, currentNotificationCenter];
            if center.is_null() {
                tracing::warn!("No current notification center");
                reply(false);
                return;
            }
            request_authorization(center, reply);
        }
    }
}

/// Send `requestAuthorizationWithOptions:completionHandler:` to `center`.
unsafe fn request_authorization(center: *mut AnyObject, reply: PermissionReply) {
    // The completion handler is an Fn block; the reply runs once.
    let reply = Mutex::new(Some(reply));
    let block = RcBlock::new(move |granted: Bool, _error: *mut AnyObject| {
        let reply = reply.lock().ok().and_then(|mut slot| slot.take());
        if let Some(reply) = reply {
            reply(granted.as_bool());
        }
    });

    let options = AUTHORIZATION_OPTION_ALERT | AUTHORIZATION_OPTION_SOUND;
    let _: () = msg_send![
        center,
        requestAuthorizationWithOptions: options,
        completionHandler: &*block
    ];
}

/// Whether `[[NSBundle mainBundle] bundleIdentifier]` is set.
fn has_bundle_identifier() -> bool {
    unsafe {
        let bundle: *mut AnyObject = msg_send![class!(NSBundle), mainBundle];
        if bundle.is_null() {
            return false;
        }
        let identifier: *mut AnyObject = msg_send![bundle, bundleIdentifier];
        !identifier.is_null()
    }
}

fn shared_application() -> *mut AnyObject {
    unsafe { msg_send![class!(NSApplication), sharedApplication] }
}

/// Whether `-[NSApplication activate]` exists (macOS 14+).
pub fn supports_foreground_activation() -> bool {
    let app = shared_application();
    let responds: Bool = unsafe { msg_send![app, respondsToSelector: sel!(activate)] };
    responds.as_bool()
}

/// Bring the app to the foreground.
pub fn activate_app() {
    let app = shared_application();
    unsafe {
        if supports_foreground_activation() {
            let _: () = msg_send![app, activate];
        } else {
            let _: () = msg_send![app, activateIgnoringOtherApps: Bool::YES];
        }
    }
}

/// Make the first visible window that can become key the key window and
/// order it front. Returns `false` if there is no such window.
pub fn raise_first_key_window() -> bool {
    let app = shared_application();
    unsafe {
        let windows: *mut AnyObject = msg_send![app, windows];
        if windows.is_null() {
            return false;
        }
        let count: usize = msg_send![windows, count];
        for index in 0..count {
            let window: *mut AnyObject = msg_send![windows, objectAtIndex: index];
            let can_become_key: Bool = msg_send![window, canBecomeKeyWindow];
            let visible: Bool = msg_send![window, isVisible];
            if can_become_key.as_bool() && visible.as_bool() {
                let _: () = msg_send![window, makeKeyAndOrderFront: std::ptr::null_mut::<AnyObject>()];
                return true;
            }
        }
    }
    false
}

/// `localizedDescription` of an `NSError`, or a fallback for nil.
unsafe fn describe_error(error: *mut AnyObject) -> String {
    if error.is_null() {
        return "Unknown error".to_string();
    }
    let description: *mut AnyObject = msg_send![error, localizedDescription];
    if description.is_null() {
        return "Unknown error".to_string();
    }
    let utf8: *const c_char = msg_send![description, UTF8String];
    if utf8.is_null() {
        return "Unknown error".to_string();
    }
    CStr::from_ptr(utf8).to_string_lossy().into_owned()
}
