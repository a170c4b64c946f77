use crate::error::{StreamError, StreamResult};
use crate::pipe::Pipe;
use crate::readable::Readable;
use crate::sink::{Writable, WritableSink, Writer};
use crate::stage::TransformStage;
use crate::stream_configuration::PipelineConfig;

/// A composed chain of stages rooted at a source.
///
/// Each call to [`Pipeline::pipe`] returns a new handle whose readable end
/// is the output of the stage just attached. Pulling from that end pulls
/// exactly one item through every stage in between; nothing is prefetched.
pub struct Pipeline<T> {
    config: PipelineConfig,
    stages: Vec<String>,
    readable: Readable<T>,
}

impl<T: Send + 'static> Pipeline<T> {
    /// Start a pipeline with no stages
    pub fn new(source: Readable<T>) -> Self {
        Self {
            config: PipelineConfig::default(),
            stages: vec![],
            readable: source,
        }
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Names of the attached stages, in order
    pub fn stages(&self) -> &[String] {
        &self.stages
    }

    /// The readable end of the tail stage
    pub fn readable(&self) -> &Readable<T> {
        &self.readable
    }

    pub fn into_readable(self) -> Readable<T> {
        self.readable
    }

    /// Attach `stage` to the tail and return the extended pipeline
    pub fn pipe<O>(self, stage: TransformStage<T, O>) -> Pipeline<O>
    where
        O: Send + 'static,
    {
        if self.config.log_stages {
            log::debug!(
                "Pipeline '{}': attaching stage '{}' at position {}",
                self.config.name,
                stage.name(),
                self.stages.len()
            );
        }

        let mut stages = self.stages;
        stages.push(stage.name().to_string());
        Pipeline {
            config: self.config,
            stages,
            readable: self.readable.pipe_through(stage),
        }
    }

    /// Attach a fresh application of a reusable [`Pipe`]
    pub fn pipe_with<O>(self, pipe: &Pipe<T, O>) -> Pipeline<O>
    where
        O: Send + 'static,
    {
        if self.config.log_stages {
            log::debug!("Pipeline '{}': attaching pipe", self.config.name);
        }

        let mut stages = self.stages;
        stages.push("pipe".to_string());
        Pipeline {
            config: self.config,
            stages,
            readable: self.readable.through(|upstream| pipe.apply(upstream)),
        }
    }

    /// Drain the pipeline into `dest`.
    ///
    /// Resolves once the sink has closed. A pipeline error aborts the sink;
    /// a sink error cancels the pipeline and aborts the sink. Either way the
    /// originating error is returned.
    pub async fn pipe_to(self, dest: &Writable<T>) -> StreamResult<()> {
        let mut reader = self.readable.get_reader()?;
        let mut writer = dest.get_writer()?;
        let mut written: u64 = 0;

        loop {
            match reader.read().await {
                Ok(Some(item)) => {
                    if let Err(err) = writer.write(item).await {
                        reader.cancel();
                        Self::abort_quietly(&mut writer, err.clone()).await;
                        log::debug!(
                            "Pipeline '{}': sink failed after {} items: {}",
                            self.config.name,
                            written,
                            err
                        );
                        return Err(err);
                    }
                    written += 1;
                }
                Ok(None) => {
                    writer.close().await?;
                    if self.config.log_stages {
                        log::debug!(
                            "Pipeline '{}': drained {} items through {} stages",
                            self.config.name,
                            written,
                            self.stages.len()
                        );
                    }
                    return Ok(());
                }
                Err(err) => {
                    Self::abort_quietly(&mut writer, err.clone()).await;
                    log::debug!(
                        "Pipeline '{}': failed after {} items: {}",
                        self.config.name,
                        written,
                        err
                    );
                    return Err(err);
                }
            }
        }
    }

    /// Wrap `sink` in a fresh [`Writable`] and drain into it
    pub async fn pipe_to_sink<S>(self, sink: S) -> StreamResult<()>
    where
        S: WritableSink<T> + 'static,
    {
        let dest = Writable::new(sink);
        self.pipe_to(&dest).await
    }

    async fn abort_quietly(writer: &mut Writer<T>, reason: StreamError) {
        if let Err(abort_err) = writer.abort(reason).await {
            log::warn!("Sink abort failed: {}", abort_err);
        }
    }
}

/// Connect `current`'s output port to `next` and return the new pipeline
pub fn pipe<I, O>(current: Pipeline<I>, next: TransformStage<I, O>) -> Pipeline<O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    current.pipe(next)
}
