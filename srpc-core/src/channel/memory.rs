//! An in-memory loopback channel (§6), used by tests and the demo app to connect two
//! in-process [`Session`]s without a real transport.

use std::rc::{Rc, Weak};

use crate::channel::{Channel, Context, SendAsync, SendSync};
use crate::session::Session;

struct Link {
    a: Weak<Session>,
    b: Weak<Session>,
}

/// One direction of an in-memory loopback: delivers straight into the other session's
/// [`Session::receive`], handing back a freshly built channel pointed the other way as
/// the reply path. Neither endpoint holds a strong reference to its peer's endpoint, so
/// there is nothing here for the weak-reference discipline elsewhere in this crate to
/// worry about (§9, "Cycles and weak references").
struct LoopbackEnd {
    link: Rc<Link>,
    from_a: bool,
}

impl LoopbackEnd {
    fn target(&self) -> Option<Rc<Session>> {
        if self.from_a {
            self.link.b.upgrade()
        } else {
            self.link.a.upgrade()
        }
    }

    fn reply_channel(&self) -> Channel {
        let reversed = Rc::new(LoopbackEnd {
            link: self.link.clone(),
            from_a: !self.from_a,
        });
        Channel::new(Some(reversed.clone()), Some(reversed))
    }
}

impl SendSync for LoopbackEnd {
    fn send_sync(&self, msg: String) -> Option<String> {
        let target = self.target()?;
        target.receive(&msg, self.reply_channel(), Context::none())
    }
}

impl SendAsync for LoopbackEnd {
    fn send_async(&self, msg: String) {
        if let Some(target) = self.target() {
            target.receive(&msg, self.reply_channel(), Context::none());
        }
    }
}

/// Wires two sessions together with a fully bidirectional in-memory channel (both a
/// sync and an async transport on each side) and binds it to both.
pub fn loopback_pair(a: &Rc<Session>, b: &Rc<Session>) {
    let link = Rc::new(Link {
        a: Rc::downgrade(a),
        b: Rc::downgrade(b),
    });
    let to_b = Rc::new(LoopbackEnd {
        link: link.clone(),
        from_a: true,
    });
    let to_a = Rc::new(LoopbackEnd { link, from_a: false });
    a.bind_channel(Channel::new(Some(to_b.clone()), Some(to_b)));
    b.bind_channel(Channel::new(Some(to_a.clone()), Some(to_a)));
}
