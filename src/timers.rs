use chordbank_core::{TimerError, TimerHost, TimerId};
use fnv::FnvHashMap;
use std::time::Duration;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys as web;

/// `setTimeout`-backed timer host.
///
/// A single callback closure serves every timer; the timer id travels as the
/// timeout argument. Browser handles are tracked so any timer can be cleared
/// before it fires.
pub struct BrowserTimers {
    window: web::Window,
    callback: Closure<dyn FnMut(JsValue)>,
    handles: FnvHashMap<TimerId, i32>,
}

impl BrowserTimers {
    pub fn new(window: web::Window, mut on_fire: impl FnMut(TimerId) + 'static) -> Self {
        let callback = Closure::wrap(Box::new(move |raw: JsValue| match raw.as_f64() {
            Some(raw) => on_fire(TimerId::from_raw(raw as u64)),
            None => log::warn!("timer fired without an id: {:?}", raw),
        }) as Box<dyn FnMut(JsValue)>);
        Self {
            window,
            callback,
            handles: FnvHashMap::default(),
        }
    }
}

impl TimerHost for BrowserTimers {
    fn arm(&mut self, id: TimerId, delay: Duration) -> Result<(), TimerError> {
        let ms = (delay.as_secs_f64() * 1000.0).round().min(i32::MAX as f64) as i32;
        let handle = self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_1(
                self.callback.as_ref().unchecked_ref(),
                ms,
                &JsValue::from_f64(id.raw() as f64),
            )
            .map_err(|e| TimerError::Arm(format!("{:?}", e)))?;
        self.handles.insert(id, handle);
        Ok(())
    }

    fn cancel(&mut self, id: TimerId) {
        if let Some(handle) = self.handles.remove(&id) {
            self.window.clear_timeout_with_handle(handle);
        }
    }

    fn acknowledge(&mut self, id: TimerId) {
        self.handles.remove(&id);
    }
}

impl Drop for BrowserTimers {
    fn drop(&mut self) {
        // The callback is freed with us; nothing may call into it afterwards.
        for (_, handle) in self.handles.drain() {
            self.window.clear_timeout_with_handle(handle);
        }
    }
}
