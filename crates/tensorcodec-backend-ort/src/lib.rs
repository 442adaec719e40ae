use anyhow::{bail, ensure, Context, Result};
use ort::{
    session::{builder::SessionBuilder, Session, SessionInputValue},
    tensor::TensorElementType,
    value::{DynValue, ValueType},
};
use tensorcodec_core::{
    Backend, BackendModel, DType, Device, IOName, IoDesc, ModelArtifact, ModelSpec, Shape, Tensor,
};
use tracing::info;

pub struct OrtBackend;

impl OrtBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for OrtBackend {
    fn default() -> Self {
        Self::new()
    }
}

pub struct OrtModel {
    spec: ModelSpec,
    session: Session,
    input_names: Vec<String>,
}

impl Backend for OrtBackend {
    type Model = OrtModel;

    fn name(&self) -> &'static str {
        "onnxruntime"
    }

    fn load(&self, artifact: &ModelArtifact, device: Device) -> Result<Self::Model> {
        let ModelArtifact::OnnxPath(path) = artifact else {
            bail!("onnxruntime backend expects an ONNX file path");
        };

        let builder = Session::builder()
            .context("failed to create ORT session builder")?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)
            .context("failed to configure ORT session builder")?;

        let builder = configure_session_builder(builder, &device)?;

        let session = builder
            .commit_from_file(path)
            .with_context(|| format!("failed to load ONNX model {}", path.display()))?;

        let input_names = session
            .inputs
            .iter()
            .map(|input| input.name.clone())
            .collect();

        let spec = build_model_spec(&session)?;
        info!(
            path = %path.display(),
            ?device,
            inputs = spec.inputs.len(),
            outputs = spec.outputs.len(),
            "loaded ONNX model"
        );

        Ok(OrtModel {
            spec,
            session,
            input_names,
        })
    }
}

impl BackendModel for OrtModel {
    fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    fn infer(&mut self, inputs: Vec<Tensor>) -> Result<Vec<Tensor>> {
        ensure!(
            inputs.len() == self.input_names.len(),
            "expected {} inputs, got {}",
            self.input_names.len(),
            inputs.len()
        );

        let mut ort_inputs = Vec::with_capacity(inputs.len());
        for (name, input) in self.input_names.iter().zip(inputs) {
            let value = tensor_to_ort_value(&input)?;
            ort_inputs.push((name.clone(), SessionInputValue::from(value)));
        }

        let outputs = self.session.run(ort_inputs)?;
        let mut out_tensors = Vec::with_capacity(outputs.len());
        for (_, value) in outputs.iter() {
            out_tensors.push(ort_value_to_tensor(&value)?);
        }

        Ok(out_tensors)
    }
}

fn build_model_spec(session: &Session) -> Result<ModelSpec> {
    let inputs = session
        .inputs
        .iter()
        .map(|input| io_desc_from_value_type(&input.name, &input.input_type))
        .collect::<Result<Vec<_>>>()?;

    let outputs = session
        .outputs
        .iter()
        .map(|output| io_desc_from_value_type(&output.name, &output.output_type))
        .collect::<Result<Vec<_>>>()?;

    Ok(ModelSpec { inputs, outputs })
}

fn configure_session_builder(builder: SessionBuilder, device: &Device) -> Result<SessionBuilder> {
    match device {
        Device::Cpu => Ok(builder),
        Device::Cuda { device_id } => configure_cuda(builder, *device_id),
    }
}

fn configure_cuda(builder: SessionBuilder, device_id: u32) -> Result<SessionBuilder> {
    #[cfg(feature = "cuda")]
    {
        use ort::execution_providers::cuda::CUDAExecutionProvider;
        let ep = CUDAExecutionProvider::default()
            .with_device_id(device_id as i32)
            .build();
        builder
            .with_execution_providers([ep])
            .context("failed to enable ORT CUDA execution provider")
    }
    #[cfg(not(feature = "cuda"))]
    {
        let _ = (builder, device_id);
        bail!("CUDA requested but tensorcodec-backend-ort was built without the `cuda` feature")
    }
}

fn io_desc_from_value_type(name: &str, value_type: &ValueType) -> Result<IoDesc> {
    let ValueType::Tensor { ty, shape, .. } = value_type else {
        bail!("unsupported non-tensor IO value type for '{name}'");
    };

    let dtype = ort_element_to_dtype(*ty)?;
    let dims = shape
        .iter()
        .map(|d| if *d < 0 { None } else { Some(*d as usize) })
        .collect();

    Ok(IoDesc {
        name: IOName(name.to_string()),
        dtype,
        dims,
    })
}

fn ort_element_to_dtype(ty: TensorElementType) -> Result<DType> {
    match ty {
        TensorElementType::Float32 => Ok(DType::F32),
        TensorElementType::Uint8 => Ok(DType::U8),
        _ => bail!("unsupported tensor element type: {ty}"),
    }
}

fn tensor_to_ort_value(tensor: &Tensor) -> Result<DynValue> {
    let shape: Vec<usize> = tensor.shape().dims().to_vec();

    let value = match tensor.dtype() {
        DType::F32 => {
            let data = tensor.to_f32_vec().context("f32 tensor without f32 data")?;
            ort::value::Tensor::from_array((shape, data))?.into_dyn()
        }
        DType::U8 => {
            let data = tensor.bytes().to_vec();
            ort::value::Tensor::from_array((shape, data))?.into_dyn()
        }
    };

    Ok(value)
}

fn ort_value_to_tensor(value: &ort::value::ValueRef<'_>) -> Result<Tensor> {
    let ValueType::Tensor { ty, shape, .. } = value.dtype() else {
        bail!("non-tensor outputs are not supported");
    };

    let dims = output_dims(shape.iter().copied())?;
    let out_shape = Shape::from_slice(&dims);

    match *ty {
        TensorElementType::Float32 => {
            let array = value.try_extract_array::<f32>()?;
            let slice = array.as_slice().context("non-contiguous output tensor")?;
            Ok(Tensor::from_f32(out_shape, slice)?)
        }
        TensorElementType::Uint8 => {
            let array = value.try_extract_array::<u8>()?;
            let slice = array.as_slice().context("non-contiguous output tensor")?;
            Ok(Tensor::from_u8(out_shape, slice.to_vec())?)
        }
        _ => bail!("unsupported output tensor element type: {ty}"),
    }
}

/// Concrete output dims. Outputs always have resolved dims, so a negative one
/// means the runtime handed back something unexpected.
fn output_dims(dims: impl Iterator<Item = i64>) -> Result<Vec<usize>> {
    dims.map(|d| usize::try_from(d).with_context(|| format!("output has unresolved dim {d}")))
        .collect()
}
