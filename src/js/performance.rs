use std::cell::RefCell;
use std::rc::Rc;

use rquickjs::function::Opt;
use rquickjs::{Ctx, Function, Object, Result, Value};

use super::registry::HostModule;
use super::throw_named;
use crate::performance::{EntryType, PerformanceEntry, PerformanceTimeline};

/// The `performance` global: a clock relative to the shared time origin plus
/// user timing marks and measures.
#[derive(Default)]
pub struct PerformanceModule {
    timeline: Rc<RefCell<PerformanceTimeline>>,
}

impl PerformanceModule {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HostModule for PerformanceModule {
    fn name(&self) -> &'static str {
        "performance"
    }

    fn uninitialize(&self, _ctx: &Ctx<'_>) -> Result<()> {
        let mut timeline = self.timeline.borrow_mut();
        timeline.clear(EntryType::Mark, None);
        timeline.clear(EntryType::Measure, None);
        Ok(())
    }

    fn exports<'js>(&self, ctx: &Ctx<'js>) -> Result<Vec<(&'static str, Value<'js>)>> {
        let performance = Object::new(ctx.clone())?;
        performance.set("timeOrigin", self.timeline.borrow().time_origin())?;

        {
            let timeline = Rc::clone(&self.timeline);
            let func =
                Function::new(ctx.clone(), move || timeline.borrow().now())?.with_name("now")?;
            performance.set("now", func)?;
        }

        {
            let timeline = Rc::clone(&self.timeline);
            let func = Function::new(
                ctx.clone(),
                move |ctx: Ctx<'js>,
                      name: String,
                      options: Opt<Value<'js>>|
                      -> Result<Object<'js>> {
                    let start_time = match options.0.as_ref().and_then(Value::as_object) {
                        Some(options) => options.get::<_, Option<f64>>("startTime")?,
                        None => None,
                    };
                    let entry = timeline.borrow_mut().mark(&name, start_time);
                    entry_object(&ctx, &entry)
                },
            )?
            .with_name("mark")?;
            performance.set("mark", func)?;
        }

        {
            let timeline = Rc::clone(&self.timeline);
            let func = Function::new(
                ctx.clone(),
                move |ctx: Ctx<'js>,
                      name: String,
                      start: Opt<Option<String>>,
                      end: Opt<Option<String>>|
                      -> Result<Object<'js>> {
                    let start = start.0.flatten();
                    let end = end.0.flatten();
                    let entry = timeline
                        .borrow_mut()
                        .measure(&name, start.as_deref(), end.as_deref())
                        .map_err(|err| throw_named(&ctx, "SyntaxError", &err.to_string()))?;
                    entry_object(&ctx, &entry)
                },
            )?
            .with_name("measure")?;
            performance.set("measure", func)?;
        }

        {
            let timeline = Rc::clone(&self.timeline);
            let func = Function::new(ctx.clone(), move |ctx: Ctx<'js>| -> Result<Vec<Object<'js>>> {
                entry_list(&ctx, &timeline.borrow().entries())
            })?
            .with_name("getEntries")?;
            performance.set("getEntries", func)?;
        }

        {
            let timeline = Rc::clone(&self.timeline);
            let func = Function::new(
                ctx.clone(),
                move |ctx: Ctx<'js>,
                      name: String,
                      entry_type: Opt<String>|
                      -> Result<Vec<Object<'js>>> {
                    let entries = match entry_type.0 {
                        Some(raw) => match EntryType::parse(&raw) {
                            Some(kind) => timeline.borrow().entries_by_name(&name, Some(kind)),
                            None => Vec::new(),
                        },
                        None => timeline.borrow().entries_by_name(&name, None),
                    };
                    entry_list(&ctx, &entries)
                },
            )?
            .with_name("getEntriesByName")?;
            performance.set("getEntriesByName", func)?;
        }

        {
            let timeline = Rc::clone(&self.timeline);
            let func = Function::new(
                ctx.clone(),
                move |ctx: Ctx<'js>, entry_type: String| -> Result<Vec<Object<'js>>> {
                    let entries = EntryType::parse(&entry_type)
                        .map(|kind| timeline.borrow().entries_by_type(kind))
                        .unwrap_or_default();
                    entry_list(&ctx, &entries)
                },
            )?
            .with_name("getEntriesByType")?;
            performance.set("getEntriesByType", func)?;
        }

        let clears = [
            ("clearMarks", EntryType::Mark),
            ("clearMeasures", EntryType::Measure),
        ];
        for (method, kind) in clears {
            let timeline = Rc::clone(&self.timeline);
            let func = Function::new(ctx.clone(), move |name: Opt<Option<String>>| {
                timeline.borrow_mut().clear(kind, name.0.flatten().as_deref());
            })?
            .with_name(method)?;
            performance.set(method, func)?;
        }

        {
            let timeline = Rc::clone(&self.timeline);
            let func = Function::new(ctx.clone(), move |ctx: Ctx<'js>| -> Result<Object<'js>> {
                let json = Object::new(ctx)?;
                json.set("timeOrigin", timeline.borrow().time_origin())?;
                Ok(json)
            })?
            .with_name("toJSON")?;
            performance.set("toJSON", func)?;
        }

        Ok(vec![("performance", performance.into_value())])
    }
}

fn entry_object<'js>(ctx: &Ctx<'js>, entry: &PerformanceEntry) -> Result<Object<'js>> {
    let object = Object::new(ctx.clone())?;
    object.set("name", entry.name.as_str())?;
    object.set("entryType", entry.entry_type.as_str())?;
    object.set("startTime", entry.start_time)?;
    object.set("duration", entry.duration)?;
    Ok(object)
}

fn entry_list<'js>(ctx: &Ctx<'js>, entries: &[PerformanceEntry]) -> Result<Vec<Object<'js>>> {
    entries.iter().map(|entry| entry_object(ctx, entry)).collect()
}
